use std::env;
use std::sync::LazyLock;
use url::Url;

macro_rules! define_env_vars {
    ($(($name:ident, $env_name:expr, $type:ty, $default:expr)),* $(,)?) => {
        $(
            pub static $name: LazyLock<$type> = LazyLock::new(|| {
                let val = env::var($env_name).unwrap_or_else(|_| $default.to_string());
                val.parse::<$type>().unwrap_or_else(|_| {
                    panic!(
                        "Failed to parse environment variable {} with value '{}' as {}",
                        $env_name,
                        val,
                        stringify!($type)
                    )
                })
            });
        )*

        /// Force initialization of all environment variables at startup
        /// Call this early in main() to fail fast if any env var is malformed
        pub fn check_env() {
            $(
                let _ = *$name;
            )*
        }
    };
}

define_env_vars!(
    (BIND_ADDR, "BIND_ADDR", String, ":3000"),
    (NODE_NAME, "NODE_NAME", String, ""),
    (GOSSIP_ADDR, "GOSSIP_ADDR", String, "gossip-members.gossip"),
    (GOSSIP_PORT, "GOSSIP_PORT", u16, 7946),
    (GOSSIP_ADVERTISE_ADDR, "GOSSIP_ADVERTISE_ADDR", String, ""),
    (GOSSIP_INTERVAL_MILLIS, "GOSSIP_INTERVAL_MILLIS", u64, 1000),
    (GOSSIP_SUSPECT_MILLIS, "GOSSIP_SUSPECT_MILLIS", u64, 5000),
    (
        ENTITY_SOURCE_URL,
        "ENTITY_SOURCE_URL",
        Url,
        "http://data-plane:3000/"
    ),
    (
        METRIC_SINK_URL,
        "METRIC_SINK_URL",
        Url,
        "http://metric-sink:3000/"
    ),
    (
        RECONCILE_INTERVAL_SECONDS,
        "RECONCILE_INTERVAL_SECONDS",
        u64,
        10
    ),
    (JOIN_DEADLINE_SECONDS, "JOIN_DEADLINE_SECONDS", u64, 60),
    (JOIN_RETRY_SECONDS, "JOIN_RETRY_SECONDS", u64, 10),
    (LEAVE_TIMEOUT_SECONDS, "LEAVE_TIMEOUT_SECONDS", u64, 10),
    (REQUEST_TIMEOUT_SECONDS, "REQUEST_TIMEOUT_SECONDS", u64, 5),
);
