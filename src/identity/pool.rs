//! Built-in identity pool
//!
//! Mainstream desktop and mobile browsers as seen by the comment endpoint.

use crate::identity::Identity;

const REFERER: &str = "https://www.bilibili.com/";
const ACCEPT: &str = "application/json, text/plain, */*";
const LANG_ZH: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const LANG_ZH_FIREFOX: &str = "zh-CN,zh;q=0.8,en-US;q=0.5,en;q=0.3";

const AGENTS: &[(&str, &str, &str)] = &[
    // Windows Chrome
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        LANG_ZH,
        "no-cache",
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        LANG_ZH,
        "no-cache",
    ),
    // Windows Firefox
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
        LANG_ZH_FIREFOX,
        "no-cache",
    ),
    // Windows Edge
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/120.0.0.0 Safari/537.36",
        LANG_ZH,
        "max-age=0",
    ),
    // macOS Chrome
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        LANG_ZH,
        "no-cache",
    ),
    // macOS Safari
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
        LANG_ZH,
        "no-cache",
    ),
    // Android Chrome
    (
        "Mozilla/5.0 (Linux; Android 13; SM-G998B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        LANG_ZH,
        "no-cache",
    ),
    // iOS Safari
    (
        "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1",
        LANG_ZH,
        "no-cache",
    ),
    // Older Android Chrome
    (
        "Mozilla/5.0 (Linux; Android 6.0.1; SOV33 Build/35.0.D.0.326) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/49.0.2623.91 Mobile Safari/537.36",
        LANG_ZH,
        "no-cache",
    ),
];

/// Returns the built-in identity pool
pub fn builtin_identities() -> Vec<Identity> {
    AGENTS
        .iter()
        .map(|(user_agent, language, cache_control)| Identity {
            user_agent: user_agent.to_string(),
            referer: REFERER.to_string(),
            accept: ACCEPT.to_string(),
            accept_language: language.to_string(),
            cache_control: cache_control.to_string(),
        })
        .collect()
}
