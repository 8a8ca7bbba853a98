//! User-agent heuristics

use ma_common::DeviceType;
use once_cell::sync::Lazy;
use regex::Regex;

static TABLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)tablet|ipad|playbook|silk").expect("tablet pattern is valid"));

static MOBILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Mobile|Android|iP(hone|od)|IEMobile|BlackBerry|Kindle|Silk-Accelerated|(hpw|web)OS|Opera M(obi|ini)")
        .expect("mobile pattern is valid")
});

static IN_APP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)FBAN|FBAV|Instagram|Line|KAKAOTALK|NAVER|SamsungBrowser.*CrossApp")
        .expect("in-app pattern is valid")
});

/// Classify a user agent as tablet, mobile or pc (checked in that order)
pub fn device_type(user_agent: &str) -> DeviceType {
    if TABLET_RE.is_match(user_agent) || is_android_tablet(user_agent) {
        DeviceType::Tablet
    } else if MOBILE_RE.is_match(user_agent) {
        DeviceType::Mobile
    } else {
        DeviceType::Pc
    }
}

/// Android without a later "mobi" token (Android phones say "Mobile")
fn is_android_tablet(user_agent: &str) -> bool {
    let lower = user_agent.to_ascii_lowercase();
    lower
        .match_indices("android")
        .any(|(pos, m)| !lower[pos + m.len()..].contains("mobi"))
}

/// In-app browsers of social and messenger apps
pub fn is_in_app_browser(user_agent: &str) -> bool {
    IN_APP_RE.is_match(user_agent)
}
