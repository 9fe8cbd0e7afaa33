//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements     | Connects to                   |
//! |-------------|----------------|-------------------------------|
//! | `json_file` | ConfigPort     | `config.json` on the host     |
//! | `log_sink`  | EventSink      | Serial / stderr log output    |
//! | `nvs`       | ConfigPort     | NVS JSON blob / in-memory     |
//! | `sim_pwm`   | OutputFactory  | In-memory duty cycle          |
//! | `status_file` | (live status) | `config.status.json` heartbeat |
//! | `sysfs_pwm` | OutputFactory  | Linux `/sys/class/pwm`        |
//! | `time`      | Clock          | esp_timer / `Instant`         |
//! |             | WallClock      | `localtime_r` / chrono        |
//! | `watcher`   | (hot reload)   | Config file mtime polling     |

pub mod json_file;
pub mod log_sink;
pub mod nvs;
pub mod sim_pwm;
pub mod status_file;
pub mod sysfs_pwm;
pub mod time;
pub mod watcher;
