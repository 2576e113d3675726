use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use paychannel_channel::{
    Channel, ChannelConfig, ChannelListener, HandlerResult, Notification, ReadStatus, Sender,
};
use paychannel_frame::FrameConfig;
use tracing::debug;

use crate::cmd::{adopt_fd, install_ctrlc_handler, ListenArgs, POLL_INTERVAL};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_notification, OutputFormat};

struct Printer {
    format: OutputFormat,
    remaining: Option<usize>,
}

impl Printer {
    fn done(&self) -> bool {
        self.remaining == Some(0)
    }
}

impl ChannelListener for Printer {
    fn on_notification(
        &mut self,
        _sender: &mut Sender,
        notification: &Notification<'_>,
    ) -> HandlerResult {
        if self.done() {
            return Ok(());
        }
        print_notification(notification, self.format);
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(())
    }

    fn on_closed(&mut self) {
        debug!("producer closed its end");
    }
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let stream = adopt_fd(args.consumer_fd, "consumer")?;
    let config = ChannelConfig {
        frame: FrameConfig {
            read_timeout: Some(POLL_INTERVAL),
            ..FrameConfig::default()
        },
        ..ChannelConfig::default()
    };
    let mut channel = Channel::receive_only(stream, config)
        .map_err(|err| channel_error("cannot open consumer", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printer = Printer {
        format,
        remaining: args.count,
    };
    while running.load(Ordering::SeqCst) && !printer.done() {
        let status = channel
            .on_readable(&mut printer)
            .map_err(|err| channel_error("receive failed", err))?;
        if status == ReadStatus::Closed {
            break;
        }
    }

    debug!(stats = ?channel.stats(), "listen finished");
    Ok(SUCCESS)
}
