//! Application sink fed by the inbound reader.

/// Receives decoded payloads in arrival order.
pub trait MessageSink: Send {
    fn deliver(&mut self, payload: Vec<u8>);
}

impl<F> MessageSink for F
where
    F: FnMut(Vec<u8>) + Send,
{
    fn deliver(&mut self, payload: Vec<u8>) {
        self(payload)
    }
}

/// Collects every payload; used by the harness and tests.
#[derive(Debug, Default)]
pub struct VecSink {
    pub payloads: Vec<Vec<u8>>,
}

impl MessageSink for VecSink {
    fn deliver(&mut self, payload: Vec<u8>) {
        self.payloads.push(payload);
    }
}
