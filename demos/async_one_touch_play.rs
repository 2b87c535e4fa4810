/*!
 * Two tasks asking for One Touch Play at once share one action
 */
use cec_otp::tokio::{drive, AsyncCec, OneTouchPlayHandle};
use cec_otp::{
    ActionRunner, CecLogicalAddress, CecModeFollower, CecModeInitiator, CecPrimDevType, Error,
    LocalDevice, OneTouchPlayConfig, Outbox,
};
use tracing_subscriber::EnvFilter;

#[::tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let cec = AsyncCec::open("/dev/cec0")?;
    cec.set_mode(CecModeInitiator::Send, CecModeFollower::All)?;
    let local = LocalDevice {
        logical_address: CecLogicalAddress::Playback2,
        physical_address: cec.get_phys()?,
        device_type: CecPrimDevType::PLAYBACK,
    };

    let runner = ActionRunner::new(Outbox::new(), local, OneTouchPlayConfig::default());
    let (handle, requests) = OneTouchPlayHandle::new(4);
    let driver = ::tokio::spawn(async move { drive(&cec, runner, requests).await });

    let other = handle.clone();
    let (a, b) = ::tokio::join!(
        handle.one_touch_play(CecLogicalAddress::Tv),
        other.one_touch_play(CecLogicalAddress::Tv),
    );
    println!("first: {:?}, second: {:?}", a, b);

    drop(handle);
    drop(other);
    match driver.await {
        Ok(r) => r,
        Err(e) => {
            println!("driver panicked: {}", e);
            Ok(())
        }
    }
}
