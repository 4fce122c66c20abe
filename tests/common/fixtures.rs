//! Capture data fixtures and client configuration helpers

use agc_stream::Config;
use std::path::Path;
use std::time::Duration;

/// Two records in the instrument's alpha/gamma column layout
pub const TWO_RECORDS: &[u8] = b"1,2\n3,4\n";

/// `count` CSV records shaped like the instrument's output
/// (`time_alpha,amp_alpha,time_gamma,amp_gamma`)
pub fn csv_records(count: usize) -> Vec<u8> {
    let mut out = String::new();
    for i in 0..count {
        let t = i as f64 * 0.000_008;
        if i % 2 == 0 {
            out.push_str(&format!("{t:.6},{:.6},0,0\n", (i % 4096) as f64 * 0.000_122));
        } else {
            out.push_str(&format!("0,0,{t:.6},{:.6}\n", (i % 4096) as f64 * 0.000_122));
        }
    }
    out.into_bytes()
}

/// Client configuration for a local mock instrument, writing into `dir`
pub fn local_config(port: u16, dir: &Path) -> Config {
    Config {
        port,
        output_path: dir.join("capture.csv"),
        connect_timeout: Some(Duration::from_secs(5)),
        poll_interval: Duration::from_millis(50),
        ..Config::for_host("127.0.0.1")
    }
}
