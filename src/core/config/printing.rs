use crate::core::config::data::Config;
use crate::core::rate_limit::RateLimitRule;

fn describe_rule(rule: RateLimitRule) -> String {
    format!("{} per {} ms", rule.max_requests, rule.window_ms)
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  chat-limit: {}", describe_rule(self.chat_limit()));
        println!("  image-limit: {}", describe_rule(self.image_limit()));
        println!("  history-window: {}", self.history_window());

        let mut domains: Vec<_> = self
            .image_allowlist()
            .domains()
            .map(str::to_owned)
            .collect();
        domains.sort();
        let source = if self.trusted_image_domains.is_some() {
            "configured"
        } else {
            "built-in"
        };
        println!("  trusted-image-domains ({source}):");
        for domain in domains {
            println!("    {domain}");
        }
    }
}
