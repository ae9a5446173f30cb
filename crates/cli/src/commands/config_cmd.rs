//! `kbchat config`: print the default configuration.

use kbchat_config::AppConfig;

pub fn print_default() {
    print!("{}", AppConfig::default_toml());
}
