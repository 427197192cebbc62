//! Run configuration: environment profiles, BOH module paths and timeouts.
//!
//! Built once at process start and passed by reference. Only
//! [`RunnerConfig::from_env`] reads the process environment.

use crate::action::ActionOptions;
use crate::locator::SelectorResolver;
use crate::result::{ComprobarError, ComprobarResult};
use crate::wait::WaitPolicy;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Variable selecting the environment profile
pub const ENV_VAR: &str = "ENV";

/// Variable overriding the BOH base URL
pub const BOH_BASE_URL_VAR: &str = "BOH_BASE_URL";

/// Path fragment of the login page
pub const LOGIN_PATH: &str = "/page/login";

/// Target environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production tenant
    Production,
    /// QA tenant
    #[default]
    Test,
}

impl Environment {
    /// Parse a variable value; anything unrecognized selects `Test`
    #[must_use]
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("production" | "prod") => Self::Production,
            _ => Self::Test,
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = ComprobarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "test" | "qa" => Ok(Self::Test),
            other => Err(ComprobarError::config(format!(
                "unknown environment {other:?} (expected production or test)"
            ))),
        }
    }
}

fn mask_secret<S: Serializer>(_: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("***")
}

/// Login credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name
    pub account: String,
    /// Password (masked when serialized)
    #[serde(serialize_with = "mask_secret")]
    pub password: String,
    /// Brand alias (tenant)
    pub brand_alias: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            account: "admin".to_string(),
            password: "admin@123".to_string(),
            brand_alias: "hex".to_string(),
        }
    }
}

/// URLs and credentials of one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    /// Auth service base URL
    pub auth_base_url: String,
    /// Login page URL
    pub login_url: String,
    /// Back-office base URL
    pub boh_base_url: String,
    /// Login credentials
    pub credentials: Credentials,
}

impl EnvironmentProfile {
    /// Built-in profile for an environment
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        let (auth, boh) = match env {
            Environment::Production => ("https://auth.hexcloud.cn", "https://boh.hexcloud.cn"),
            Environment::Test => (
                "https://saas-auth-qa.hexcloud.cn",
                "https://saas-boh-qa.hexcloud.cn",
            ),
        };
        Self {
            auth_base_url: auth.to_string(),
            login_url: full_url(auth, LOGIN_PATH),
            boh_base_url: boh.to_string(),
            credentials: Credentials::default(),
        }
    }
}

/// Join a base URL and a relative path with exactly one `/`
#[must_use]
pub fn full_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Relative paths of back-office modules, grouped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulePaths {
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

const BOH_MODULES: &[(&str, &[(&str, &str)])] = &[
    (
        "organization",
        &[
            ("company", "/metadata/company-info"),
            ("store", "/metadata/store"),
            ("warehouse", "/metadata/warehouse"),
            ("supplier", "/metadata/franchisee"),
        ],
    ),
    (
        "product",
        &[("item", "/product/item"), ("attribute", "/product/attribute")],
    ),
    (
        "storeOperations",
        &[
            ("order", "/store-supply/demand-daily"),
            ("productionOrder", "/boh-product-order/store"),
            ("requestOrder", "/store-supply/order"),
            ("selfPicking", "/store-supply/self-picking"),
            ("receive", "/store-supply/receive"),
            ("receiveDiff", "/store-supply/receive-diff"),
            ("return", "/store-supply/return"),
            ("adjust", "/store-supply/adjust"),
            ("stocktake", "/store-supply/stocktake"),
            ("transfer", "/store-supply/transfer"),
            ("inventoryTrace", "/store-supply/inventory/trace"),
            ("inventoryRealtime", "/store-supply/inventory/realtime"),
            ("inventoryDaily", "/store-supply/inventory/daily"),
        ],
    ),
    (
        "warehouseOperations",
        &[
            ("productionOrder", "/boh-product-order/warehouse"),
            ("purchase", "/warehouse/purchase"),
            ("receive", "/warehouse/receive"),
            ("purchaseReturn", "/warehouse/purchase-return"),
            ("storeReturn", "/warehouse/store-return"),
            ("sendOrder", "/warehouse/send-order"),
            ("transfer", "/warehouse/transfer"),
            ("stocktake", "/warehouse/stocktake"),
            ("adjust", "/warehouse/adjust"),
            ("inventoryTrace", "/warehouse/inventory/trace"),
            ("inventoryRealtime", "/warehouse/inventory/realtime"),
            ("inventoryDaily", "/warehouse/inventory/daily"),
        ],
    ),
    (
        "storeAudit",
        &[
            ("receiveDiff", "/store-audit/receive-diff"),
            ("return", "/store-audit/return"),
        ],
    ),
    (
        "storeManagement",
        &[
            ("orderSchedule", "/store-management/schedule/order"),
            ("stocktakeSchedule", "/store-management/schedule/stocktake"),
            ("adjustSchedule", "/store-management/schedule/adjust"),
            ("stocktakeIrregular", "/store-management/stocktake-irregular"),
            ("orderRule", "/store-management/order-rule"),
            ("adjustDemand", "/store-management/adjust-demand"),
            ("adjustReturn", "/store-management/adjust-return"),
            ("demandMain", "/store-management/demand-main"),
        ],
    ),
    (
        "warehouseManagement",
        &[
            ("stocktakeSchedule", "/warehouse-management/schedule/stocktake"),
            ("adjustSchedule", "/warehouse-management/schedule/adjust"),
        ],
    ),
    (
        "supplier",
        &[
            ("demandOrder", "/supplier/demand-order"),
            ("sendOrder", "/supplier/send-order"),
            ("returnOrder", "/supplier/return-order"),
        ],
    ),
    ("storeReport", &[("orderReport", "/store-bi/order")]),
];

impl Default for ModulePaths {
    fn default() -> Self {
        let groups = BOH_MODULES
            .iter()
            .map(|(group, entries)| {
                let paths = entries
                    .iter()
                    .map(|(key, path)| ((*key).to_string(), (*path).to_string()))
                    .collect();
                ((*group).to_string(), paths)
            })
            .collect();
        Self { groups }
    }
}

impl ModulePaths {
    /// Relative path of a module
    #[must_use]
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .get(group)
            .and_then(|g| g.get(key))
            .map(String::as_str)
    }

    /// Absolute URL of a module under `base`
    pub fn url(&self, base: &str, group: &str, key: &str) -> ComprobarResult<String> {
        self.get(group, key)
            .map(|path| full_url(base, path))
            .ok_or_else(|| ComprobarError::config(format!("unknown module {group}.{key}")))
    }

    /// Iterate `(group, key, path)` in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.groups.iter().flat_map(|(group, entries)| {
            entries
                .iter()
                .map(move |(key, path)| (group.as_str(), key.as_str(), path.as_str()))
        })
    }
}

/// Wait budgets used across the flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// DOMContentLoaded waits
    pub page_load: Duration,
    /// Direct navigations
    pub navigation: Duration,
    /// Network-idle waits
    pub network_idle: Duration,
    /// Navigation confirmation after clicks
    pub navigation_confirm: Duration,
    /// Per-strategy visibility timeout
    pub element: Duration,
    /// Visibility polling interval
    pub element_poll: Duration,
    /// Visibility timeout for the order number in the listing
    pub list_row: Duration,
    /// Pause after a page transition before reading it
    pub post_navigation: Duration,
    /// Scroll-then-act pause
    pub settle: Duration,
    /// Pause between action attempts
    pub action_backoff: Duration,
    /// Attempts per action
    pub action_attempts: u32,
    /// Leaving the login page
    pub login_redirect: WaitPolicy,
    /// Order number appearing on the detail page
    pub detail_order_number: WaitPolicy,
    /// Detail header fields loading
    pub detail_fields: WaitPolicy,
    /// Detail header fields after the reload escalation
    ///
    /// Slower and longer than `detail_fields`: a reloaded page refetches
    /// every field from scratch.
    pub detail_after_reload: WaitPolicy,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(10),
            navigation: Duration::from_secs(30),
            network_idle: Duration::from_secs(15),
            navigation_confirm: Duration::from_secs(15),
            element: Duration::from_secs(2),
            element_poll: Duration::from_millis(100),
            list_row: Duration::from_secs(10),
            post_navigation: Duration::from_secs(2),
            settle: Duration::from_millis(500),
            action_backoff: Duration::from_secs(1),
            action_attempts: 3,
            login_redirect: WaitPolicy::patient(),
            detail_order_number: WaitPolicy::new(Duration::from_secs(1), 10),
            detail_fields: WaitPolicy::new(Duration::from_millis(500), 15).with_nudge_every(5),
            detail_after_reload: WaitPolicy::new(Duration::from_secs(1), 15).with_nudge_every(5),
        }
    }
}

impl Timeouts {
    /// Short budgets for mock-driven runs
    #[must_use]
    pub fn fast() -> Self {
        let ms = Duration::from_millis;
        Self {
            page_load: ms(200),
            navigation: ms(500),
            network_idle: ms(200),
            navigation_confirm: ms(200),
            element: ms(100),
            element_poll: ms(20),
            list_row: ms(200),
            post_navigation: ms(10),
            settle: ms(10),
            action_backoff: ms(20),
            action_attempts: 3,
            login_redirect: WaitPolicy::new(ms(20), 10),
            detail_order_number: WaitPolicy::new(ms(20), 10),
            detail_fields: WaitPolicy::new(ms(10), 15).with_nudge_every(5),
            detail_after_reload: WaitPolicy::new(ms(20), 15).with_nudge_every(5),
        }
    }
}

/// Everything a run needs, resolved once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Selected environment
    pub environment: Environment,
    /// URLs and credentials
    pub profile: EnvironmentProfile,
    /// Module path table
    pub modules: ModulePaths,
    /// Wait budgets
    pub timeouts: Timeouts,
}

impl RunnerConfig {
    /// Configuration for an environment with built-in values
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            profile: EnvironmentProfile::for_environment(environment),
            modules: ModulePaths::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Resolve from `ENV` and `BOH_BASE_URL`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::from_value(lookup(ENV_VAR).as_deref());
        let config = Self::for_environment(environment);
        match lookup(BOH_BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            Some(url) => config.with_boh_base_url(url),
            None => config,
        }
    }

    /// Override the back-office base URL
    #[must_use]
    pub fn with_boh_base_url(mut self, url: impl Into<String>) -> Self {
        self.profile.boh_base_url = url.into();
        self
    }

    /// Replace the wait budgets
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Absolute URL of a back-office module
    pub fn boh_url(&self, group: &str, key: &str) -> ComprobarResult<String> {
        self.modules.url(&self.profile.boh_base_url, group, key)
    }

    /// Resolver using the configured element timeouts
    #[must_use]
    pub fn resolver(&self) -> SelectorResolver {
        SelectorResolver::new()
            .with_strategy_timeout(self.timeouts.element)
            .with_poll_interval(self.timeouts.element_poll)
    }

    /// Action options using the configured retry budget
    #[must_use]
    pub fn action_options(&self) -> ActionOptions {
        ActionOptions::new()
            .with_attempts(self.timeouts.action_attempts)
            .with_backoff(self.timeouts.action_backoff)
            .with_settle(self.timeouts.settle)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod environment_tests {
        use super::*;

        #[test]
        fn test_unknown_or_missing_defaults_to_test() {
            assert_eq!(Environment::from_value(None), Environment::Test);
            assert_eq!(Environment::from_value(Some("staging")), Environment::Test);
            assert_eq!(
                Environment::from_value(Some("Production")),
                Environment::Production
            );
        }

        #[test]
        fn test_from_str_is_strict() {
            assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
            assert!("staging".parse::<Environment>().is_err());
        }

        #[test]
        fn test_profiles() {
            let test = EnvironmentProfile::for_environment(Environment::Test);
            assert_eq!(test.login_url, "https://saas-auth-qa.hexcloud.cn/page/login");
            assert_eq!(test.boh_base_url, "https://saas-boh-qa.hexcloud.cn");
            let prod = EnvironmentProfile::for_environment(Environment::Production);
            assert_eq!(prod.login_url, "https://auth.hexcloud.cn/page/login");
            assert_eq!(prod.credentials.brand_alias, "hex");
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_full_url_normalizes_slashes() {
            assert_eq!(full_url("https://boh/", "/a"), "https://boh/a");
            assert_eq!(full_url("https://boh", "a"), "https://boh/a");
            assert_eq!(full_url("https://boh//", "a/b"), "https://boh/a/b");
        }

        #[test]
        fn test_module_lookup() {
            let modules = ModulePaths::default();
            assert_eq!(
                modules.get("storeOperations", "order"),
                Some("/store-supply/demand-daily")
            );
            assert_eq!(modules.get("storeReport", "orderReport"), Some("/store-bi/order"));
            assert!(modules.get("storeOperations", "nope").is_none());
            assert!(modules.url("https://boh", "x", "y").is_err());
            assert_eq!(modules.iter().count(), 47);
        }
    }

    mod runner_config_tests {
        use super::*;

        fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = vars
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |key| map.get(key).cloned()
        }

        #[test]
        fn test_boh_override_only_touches_boh() {
            let config = RunnerConfig::from_lookup(lookup(&[
                ("ENV", "production"),
                ("BOH_BASE_URL", "https://boh.internal/"),
            ]));
            assert_eq!(config.environment, Environment::Production);
            assert_eq!(config.profile.login_url, "https://auth.hexcloud.cn/page/login");
            assert_eq!(
                config.boh_url("storeOperations", "order").unwrap(),
                "https://boh.internal/store-supply/demand-daily"
            );
        }

        #[test]
        fn test_blank_override_ignored() {
            let config = RunnerConfig::from_lookup(lookup(&[("BOH_BASE_URL", "  ")]));
            assert_eq!(config.profile.boh_base_url, "https://saas-boh-qa.hexcloud.cn");
        }

        #[test]
        fn test_password_masked_in_json() {
            let json = serde_json::to_string(&RunnerConfig::default()).unwrap();
            assert!(!json.contains("admin@123"));
            assert!(json.contains("\"password\":\"***\""));
            assert!(json.contains("\"environment\":\"test\""));
        }

        #[test]
        fn test_resolver_and_action_options_follow_timeouts() {
            let config = RunnerConfig::default().with_timeouts(Timeouts::fast());
            assert_eq!(config.resolver().strategy_timeout(), Duration::from_millis(100));
            assert_eq!(config.action_options().settle, Duration::from_millis(10));
        }

        #[test]
        fn test_every_policy_is_bounded() {
            let t = Timeouts::default();
            for policy in [
                t.login_redirect,
                t.detail_order_number,
                t.detail_fields,
                t.detail_after_reload,
            ] {
                assert!(policy.max_duration() <= Duration::from_secs(30));
            }
        }

        #[test]
        fn test_reload_phase_waits_longer_than_first_phase() {
            let t = Timeouts::default();
            assert_eq!(t.detail_fields.max_duration(), Duration::from_millis(7500));
            assert_eq!(t.detail_after_reload.max_duration(), Duration::from_secs(15));
            assert_eq!(t.detail_after_reload.max_attempts, t.detail_fields.max_attempts);
            assert!(t.detail_after_reload.interval > t.detail_fields.interval);
        }
    }
}
