use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use paychannel_channel::{
    Channel, ChannelConfig, ChannelListener, HandlerResult, Notification, Sender,
};
use paychannel_frame::FrameConfig;
use tracing::{debug, info};

use crate::cmd::{adopt_fd, install_ctrlc_handler, EchoArgs, POLL_INTERVAL};
use crate::exit::{channel_error, transport_error, CliResult, SUCCESS};

#[derive(Default)]
struct Echo {
    echoed: u64,
}

impl ChannelListener for Echo {
    fn on_notification(
        &mut self,
        sender: &mut Sender,
        notification: &Notification<'_>,
    ) -> HandlerResult {
        sender.send(notification.header(), notification.payload())?;
        self.echoed += 1;
        debug!(
            event = %notification.event(),
            payload_len = notification.payload_len(),
            "echoed"
        );
        Ok(())
    }
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let consumer = adopt_fd(args.consumer_fd, "consumer")?;
    let producer = if args.producer_fd == args.consumer_fd {
        consumer
            .try_clone()
            .map_err(|err| transport_error("cannot duplicate descriptor", err))?
    } else {
        adopt_fd(args.producer_fd, "producer")?
    };

    let config = ChannelConfig {
        frame: FrameConfig {
            read_timeout: Some(POLL_INTERVAL),
            ..FrameConfig::default()
        },
        ..ChannelConfig::default()
    };
    let mut channel = Channel::with_config(consumer, producer, config)
        .map_err(|err| channel_error("cannot open channel", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut echo = Echo::default();
    channel
        .run_until(&mut echo, || running.load(Ordering::SeqCst))
        .map_err(|err| channel_error("receive failed", err))?;

    info!(echoed = echo.echoed, stats = ?channel.stats(), "echo finished");
    Ok(SUCCESS)
}
