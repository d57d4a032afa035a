//! Wi-Fi link status from the running driver.

use esp_idf_svc::sys;
use webdebug_core::{LinkMonitor, LinkStatus};

/// Reads soft-AP and station state straight from the Wi-Fi driver.
///
/// The driver itself is owned by whoever brought the link up.
#[derive(Debug, Default)]
pub struct EspLink;

impl EspLink {
    pub fn new() -> Self {
        Self
    }
}

impl LinkMonitor for EspLink {
    fn status(&self) -> LinkStatus {
        let mut stations = sys::wifi_sta_list_t::default();
        let connected_stations = if unsafe { sys::esp_wifi_ap_get_sta_list(&mut stations) }
            == sys::ESP_OK
        {
            stations.num.max(0) as u32
        } else {
            0
        };

        let mut ap = sys::wifi_ap_record_t::default();
        let (sta_connected, rssi) =
            if unsafe { sys::esp_wifi_sta_get_ap_info(&mut ap) } == sys::ESP_OK {
                (true, i32::from(ap.rssi))
            } else {
                (false, 0)
            };

        LinkStatus {
            connected_stations,
            sta_connected,
            rssi,
        }
    }
}
