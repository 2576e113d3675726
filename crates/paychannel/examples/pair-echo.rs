//! Controller and worker in one process, joined by two socket pairs.
//!
//! The worker thread echoes every notification back; the controller sends a
//! few and prints the replies.
//!
//! Run with:
//!   cargo run --example pair-echo

use std::thread;

use paychannel::transport::IpcStream;
use paychannel::{
    Channel, ChannelListener, EventId, HandlerResult, Notification, NotificationHeader, Sender,
};

struct Echo;

impl ChannelListener for Echo {
    fn on_notification(
        &mut self,
        sender: &mut Sender,
        notification: &Notification<'_>,
    ) -> HandlerResult {
        sender.send(notification.header(), notification.payload())?;
        Ok(())
    }

    fn on_closed(&mut self) {
        eprintln!("worker: controller went away");
    }
}

#[derive(Default)]
struct Replies {
    received: usize,
}

impl ChannelListener for Replies {
    fn on_notification(
        &mut self,
        _sender: &mut Sender,
        notification: &Notification<'_>,
    ) -> HandlerResult {
        self.received += 1;
        eprintln!(
            "controller: {} data={} payload={:?}",
            notification.event(),
            serde_json::Value::Object(notification.data().clone()),
            String::from_utf8_lossy(notification.payload())
        );
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (to_worker, worker_in) = IpcStream::pair()?;
    let (worker_out, from_worker) = IpcStream::pair()?;

    let mut worker = Channel::new(worker_in, worker_out)?;
    let handle = thread::spawn(move || worker.run(&mut Echo));

    let mut controller = Channel::new(from_worker, to_worker)?;
    let messages = ["one", "two", "three"];
    for (seq, text) in messages.iter().enumerate() {
        let mut data = serde_json::Map::new();
        data.insert("seq".to_string(), seq.into());
        let header = NotificationHeader::new(EventId::DataProducerSend).with_data(data);
        controller.send(&header, text.as_bytes())?;
    }

    let mut replies = Replies::default();
    while replies.received < messages.len() {
        controller.on_readable(&mut replies)?;
    }
    eprintln!("controller: {:?}", controller.stats());

    controller.close();
    handle.join().map_err(|_| "worker thread panicked")??;
    Ok(())
}
