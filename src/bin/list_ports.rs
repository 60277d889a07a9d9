use serialport::{SerialPortType, available_ports};
use tracing::info;

fn main() {
    tracing_subscriber::fmt::init();

    info!("Listing serial ports...");

    match available_ports() {
        Ok(ports) => {
            if ports.is_empty() {
                info!("No serial ports found.");
                return;
            }
            for port in ports {
                info!("Port: {}", port.port_name);
                match port.port_type {
                    SerialPortType::UsbPort(usb) => {
                        info!(
                            "  USB VID: {:#06x}, PID: {:#06x}",
                            usb.vid, usb.pid
                        );
                        if let Some(product) = usb.product {
                            info!("  Product: {}", product);
                        }
                        if let Some(serial) = usb.serial_number {
                            info!("  Serial: {}", serial);
                        }
                    }
                    other => info!("  Type: {:?}", other),
                }
            }
        }
        Err(e) => {
            eprintln!("Error listing serial ports: {:?}", e);
        }
    }
}
