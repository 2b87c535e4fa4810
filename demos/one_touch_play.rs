/*!
 * Wake the TV and switch it to this device
 */
use std::time::Instant;

use cec_otp::*;
use tracing_subscriber::EnvFilter;

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let cec = CecDevice::open("/dev/cec0")?;
    cec.set_mode(CecModeInitiator::Send, CecModeFollower::All)?;

    let local = LocalDevice {
        logical_address: CecLogicalAddress::Playback2,
        physical_address: cec.get_phys()?,
        device_type: CecPrimDevType::PLAYBACK,
    };
    println!("we are {:?} at {}", local.logical_address, local.physical_address);

    let mut runner = ActionRunner::new(&cec, local, OneTouchPlayConfig::default());
    let (tx, rx) = std::sync::mpsc::channel::<ResultCode>();
    if !runner.one_touch_play(CecLogicalAddress::Tv, Box::new(tx), Instant::now()) {
        println!("one touch play not possible");
        return Ok(());
    }
    runner.run_blocking()?;

    match rx.recv() {
        Ok(ResultCode::Success) => println!("TV is on"),
        Ok(ResultCode::Timeout) => println!("TV did not answer"),
        Err(_) => println!("no result"),
    }
    Ok(())
}
