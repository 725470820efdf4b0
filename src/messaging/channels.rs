// Communication channels lock-free

use crate::messaging::command::{AudioCommand, ControlCommand};
use crate::messaging::event::MetronomeEvent;
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type AudioCommandProducer = ringbuf::HeapProd<AudioCommand>;
pub type AudioCommandConsumer = ringbuf::HeapCons<AudioCommand>;

pub fn create_audio_channel(capacity: usize) -> (AudioCommandProducer, AudioCommandConsumer) {
    let rb = HeapRb::<AudioCommand>::new(capacity);
    rb.split()
}

pub type ControlProducer = ringbuf::HeapProd<ControlCommand>;
pub type ControlConsumer = ringbuf::HeapCons<ControlCommand>;

pub fn create_control_channel(capacity: usize) -> (ControlProducer, ControlConsumer) {
    let rb = HeapRb::<ControlCommand>::new(capacity);
    rb.split()
}

pub type EventProducer = ringbuf::HeapProd<MetronomeEvent>;
pub type EventConsumer = ringbuf::HeapCons<MetronomeEvent>;

pub fn create_event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let rb = HeapRb::<MetronomeEvent>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}
