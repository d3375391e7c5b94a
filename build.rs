use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Drop a config template next to the target dir if there isn't one yet
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../tsgate.template.toml");

    let template = r#"# tsgate configuration
# Copy this file to 'tsgate.toml' and adjust as needed.
# Every key is optional; TSGATE_<KEY> environment variables take precedence.

multicast_group = "239.0.0.1"
multicast_port = 5004
http_port = 8080
rtp_send_port = 5006
payload_type = 96
ssrc = 0x12345678
max_rtp_payload = 1200
"#;

    if !template_path.exists() {
        let _ = fs::write(template_path, template);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
