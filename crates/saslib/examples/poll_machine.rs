//! Basic gaming machine polling example.
//!
//! Discovers the machine address, reads meters 10-15, then general-polls
//! for exceptions until Ctrl-C.
//!
//! # Requirements
//!
//! - A gaming machine's SAS port wired to a serial adapter
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=saslib_protocol=debug cargo run -p saslib --example poll_machine
//! ```

use std::time::Duration;

use saslib::{Error, PollEvent, SasBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    let client = SasBuilder::new()
        .serial_port(serial_port)
        .timeout(Duration::from_millis(500))
        .denomination(0.01)
        .build()
        .await?;

    println!("Waiting for the gaming machine on {serial_port}...");
    let address = client.start().await?;
    println!("Machine address: {address}");

    match client.send_meters_10_15(true).await? {
        Some(meters) => {
            for (name, value) in meters.to_map() {
                println!("  {name}: {value}");
            }
        }
        None => println!("Meters: no response"),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
        match client.events_poll().await {
            Ok(PollEvent::Event { code, description }) => {
                println!("[{code:#04x}] {description}");
            }
            Ok(PollEvent::NoActivity) | Err(Error::NoConnection) => {}
            Err(e) => println!("general poll failed: {e}"),
        }
    }

    client.close().await?;
    Ok(())
}
