//! Bus-idle pin states (`spec.md` §4.B).
use crate::platform::{GpibPin, GpibPins};

/// Establishes the controller-mode bus-idle pin state: ATN released,
/// EOI/DAV/SRQ high-Z, NRFD/NDAC driven low, IFC released, REN driven low,
/// all DIO lines released.
///
/// [`GpibPins::init_controller_idle`] is where a platform sets its own
/// drive-direction pins (`SC`/`DC`/`TE`/`PE` in the reference hardware);
/// everything named on the GPIB bus itself is driven here, generically.
pub fn init_controller_pins<P: GpibPins>(pins: &mut P) {
    pins.init_controller_idle();
    pins.release(GpibPin::Atn);
    pins.release(GpibPin::Eoi);
    pins.release(GpibPin::Dav);
    pins.release(GpibPin::Srq);
    pins.drive_low(GpibPin::Nrfd);
    pins.drive_low(GpibPin::Ndac);
    pins.release(GpibPin::Ifc);
    pins.drive_low(GpibPin::Ren);
    pins.release_data_bus();
}

/// Establishes the device-mode bus-idle pin state: every management and
/// handshake line high-Z, all DIO lines released.
pub fn init_device_pins<P: GpibPins>(pins: &mut P) {
    pins.init_device_idle();
    for line in [
        GpibPin::Atn,
        GpibPin::Eoi,
        GpibPin::Dav,
        GpibPin::Nrfd,
        GpibPin::Ndac,
        GpibPin::Ifc,
        GpibPin::Ren,
    ] {
        pins.release(line);
    }
    pins.release_data_bus();
}
