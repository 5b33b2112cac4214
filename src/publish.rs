use crate::error::PublishFault;

/// Broker-assigned id of an accepted publish.
pub type MessageId = u32;

/// Outbound half of the broker session. Session and retry policy belong to
/// the implementation.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<MessageId, PublishFault>;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<MessageId, PublishFault> {
        (**self).publish(topic, payload)
    }
}
