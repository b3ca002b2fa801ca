use std::fmt::Display;

use serde_json::{json, Map, Value};

use crate::config::{non_empty, Config};

const PRIMARY_PROGRAM: &str = "type:logstash_tcp";
const PRIMARY_HOMEDIR: &str = "/home/app_smx/jboss-fuse-6.1.0.redhat-379";
const PRIMARY_HOMEDIR_UAT: &str = "/home/app_smx_sg0/jboss-fuse-6.1.0.redhat-379";
const PROXY_PROGRAM: &str = "haproxy";
const WEB_MARKER_FIELD: &str = "request_uri";

const TIMESTAMP_FIELD: &str = "@timestamp";

/// The log source a query is shaped for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    PrimaryLog,
    ProxyAccessLog,
    WebAccessLog,
}

/// The backend endpoint a query is sent to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Count,
}

impl Endpoint {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Search => "_search",
            Self::Count => "_count",
        }
    }

    pub fn for_config(config: &Config) -> Self {
        if config.count {
            Self::Count
        } else {
            Self::Search
        }
    }
}

/// Builds the full JSON request body for the configuration
pub fn build(config: &Config) -> Value {
    let mut root = Map::new();

    if !config.count {
        root.insert("fields".to_string(), json!(["_source"]));
    }

    root.insert(
        "query".to_string(),
        json!({
            "filtered": {
                "query": {
                    "bool": {
                        "should": [
                            { "query_string": { "query": query_string(config) } }
                        ]
                    }
                },
                "filter": {
                    "bool": {
                        "must": [
                            {
                                "range": {
                                    TIMESTAMP_FIELD: {
                                        "gte": config.from_time,
                                        "lte": config.until_time,
                                    }
                                }
                            }
                        ]
                    }
                }
            }
        }),
    );

    if !config.count {
        root.insert("size".to_string(), json!(config.num_logs));
        root.insert("from".to_string(), json!(config.offset));
        root.insert(
            "sort".to_string(),
            json!([
                { TIMESTAMP_FIELD: { "order": "desc", "ignore_unmapped": true } }
            ]),
        );
    }

    Value::Object(root)
}

/// Builds the Lucene query string for the configuration
pub fn query_string(config: &Config) -> String {
    let mut clauses = match config.flavor() {
        Flavor::PrimaryLog => primary_log(config),
        Flavor::ProxyAccessLog => proxy_access_log(config),
        Flavor::WebAccessLog => web_access_log(config),
    };

    clauses.phrase("host", &config.host);

    let mut query = clauses.finish();

    let ext_terms = config
        .ext_terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .collect::<Vec<&str>>();

    if !ext_terms.is_empty() {
        query.push_str(" AND ");
        query.push_str(&ext_terms.join(" "));
    }

    query
}

fn primary_log(config: &Config) -> Clauses {
    let homedir = if config.uat {
        PRIMARY_HOMEDIR_UAT
    } else {
        PRIMARY_HOMEDIR
    };

    let mut clauses = Clauses::new(PRIMARY_PROGRAM);
    clauses.push(format!("app_homedir:{}", quote(homedir)));

    if config.errors {
        clauses.push(format!("level:{}", quote("ERROR")));
    }

    clauses.phrase("camel_correlationId", &config.correlation_id);
    clauses.phrase("camel_contextId", &config.context_id);
    clauses.phrase("stack_trace", &config.stack_trace);
    clauses.phrase("logger_name", &config.logger_name);
    clauses.phrase("bundle_name", &config.bundle_name);
    clauses.phrase("message", &config.message);
    clauses
}

fn proxy_access_log(config: &Config) -> Clauses {
    let mut clauses = Clauses::new(format!("program:{}", quote(PROXY_PROGRAM)));
    clauses.phrase("app_id", &config.app_id);
    clauses.phrase("request_path", &config.request_uri);
    clauses.term("status_code", config.status_code);
    clauses.phrase("endpoint", &config.endpoint);
    clauses.phrase("client_ip", &config.client_ip);
    clauses.phrase("message", &config.message);
    clauses
}

fn web_access_log(config: &Config) -> Clauses {
    let mut clauses = Clauses::new(format!("_exists_:{}", WEB_MARKER_FIELD));
    clauses.phrase("request_uri", &config.request_uri);
    clauses.term("status", config.status_code);
    clauses.phrase("endpoint", &config.endpoint);
    clauses.phrase("client_ip", &config.client_ip);
    clauses.phrase("message", &config.message);
    clauses
}

/// Query clauses that are joined with `AND`
struct Clauses(Vec<String>);

impl Clauses {
    fn new(base: impl Into<String>) -> Self {
        Self(vec![base.into()])
    }

    fn push(&mut self, clause: String) {
        self.0.push(clause);
    }

    /// Adds `field:"value"` when the value is set
    fn phrase(&mut self, field: &str, value: &Option<String>) {
        if let Some(value) = non_empty(value) {
            self.push(format!("{}:{}", field, quote(value)));
        }
    }

    /// Adds an unquoted `field:value` when the value is set
    fn term(&mut self, field: &str, value: Option<impl Display>) {
        if let Some(value) = value {
            self.push(format!("{}:{}", field, value));
        }
    }

    fn finish(self) -> String {
        self.0.join(" AND ")
    }
}

/// Wraps a value in double quotes, escaping quotes and backslashes
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');

    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }

    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> Config {
        Config::default()
    }

    fn proxy() -> Config {
        Config {
            proxy_log: true,
            ..Config::default()
        }
    }

    fn web() -> Config {
        Config {
            web_log: true,
            ..Config::default()
        }
    }

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn primary_log_base() {
        assert_eq!(
            query_string(&primary()),
            r#"type:logstash_tcp AND app_homedir:"/home/app_smx/jboss-fuse-6.1.0.redhat-379""#
        );
    }

    #[test]
    fn primary_log_uat() {
        let config = Config {
            uat: true,
            ..primary()
        };
        assert_eq!(
            query_string(&config),
            r#"type:logstash_tcp AND app_homedir:"/home/app_smx_sg0/jboss-fuse-6.1.0.redhat-379""#
        );
    }

    #[test]
    fn primary_log_all_filters() {
        let config = Config {
            errors: true,
            correlation_id: some("abc123"),
            context_id: some("ctx-1"),
            stack_trace: some("NullPointerException"),
            logger_name: some("org.example.Router"),
            bundle_name: some("example-bundle"),
            message: some("out of memory"),
            ..primary()
        };

        assert_eq!(
            query_string(&config),
            concat!(
                r#"type:logstash_tcp AND app_homedir:"/home/app_smx/jboss-fuse-6.1.0.redhat-379""#,
                r#" AND level:"ERROR""#,
                r#" AND camel_correlationId:"abc123""#,
                r#" AND camel_contextId:"ctx-1""#,
                r#" AND stack_trace:"NullPointerException""#,
                r#" AND logger_name:"org.example.Router""#,
                r#" AND bundle_name:"example-bundle""#,
                r#" AND message:"out of memory""#,
            )
        );
    }

    #[test]
    fn primary_log_ignores_other_flavor_fields() {
        let config = Config {
            app_id: some("app"),
            request_uri: some("/health"),
            status_code: Some(500),
            endpoint: some("health"),
            client_ip: some("10.0.0.1"),
            ..primary()
        };
        assert_eq!(query_string(&config), query_string(&primary()));
    }

    #[test]
    fn empty_values_are_absent() {
        let config = Config {
            correlation_id: some(""),
            message: some(""),
            host: some(""),
            ..primary()
        };
        let query = query_string(&config);
        assert_eq!(query, query_string(&primary()));
        assert!(!query.ends_with("AND"));
    }

    #[test]
    fn proxy_access_log_base() {
        assert_eq!(query_string(&proxy()), r#"program:"haproxy""#);
    }

    #[test]
    fn proxy_access_log_all_filters() {
        let config = Config {
            app_id: some("billing"),
            request_uri: some("/api/v1/orders"),
            status_code: Some(503),
            endpoint: some("orders"),
            client_ip: some("10.1.2.3"),
            message: some("timeout"),
            ..proxy()
        };

        assert_eq!(
            query_string(&config),
            concat!(
                r#"program:"haproxy""#,
                r#" AND app_id:"billing""#,
                r#" AND request_path:"/api/v1/orders""#,
                r#" AND status_code:503"#,
                r#" AND endpoint:"orders""#,
                r#" AND client_ip:"10.1.2.3""#,
                r#" AND message:"timeout""#,
            )
        );
    }

    #[test]
    fn proxy_access_log_ignores_primary_fields() {
        let config = Config {
            errors: true,
            correlation_id: some("abc123"),
            ..proxy()
        };
        assert_eq!(query_string(&config), r#"program:"haproxy""#);
    }

    #[test]
    fn web_access_log_base() {
        assert_eq!(query_string(&web()), "_exists_:request_uri");
    }

    #[test]
    fn web_access_log_all_filters() {
        let config = Config {
            request_uri: some("/index.html"),
            status_code: Some(404),
            endpoint: some("static"),
            client_ip: some("192.168.0.7"),
            message: some("GET"),
            ..web()
        };

        assert_eq!(
            query_string(&config),
            concat!(
                "_exists_:request_uri",
                r#" AND request_uri:"/index.html""#,
                r#" AND status:404"#,
                r#" AND endpoint:"static""#,
                r#" AND client_ip:"192.168.0.7""#,
                r#" AND message:"GET""#,
            )
        );
    }

    #[test]
    fn proxy_wins_over_web() {
        let config = Config {
            proxy_log: true,
            web_log: true,
            ..Config::default()
        };
        assert_eq!(query_string(&config), r#"program:"haproxy""#);
    }

    #[test]
    fn host_and_extra_terms_follow_flavor_clauses() {
        let config = Config {
            host: some("web-01"),
            ext_terms: vec!["level:WARN".to_string(), "OR".to_string(), "level:ERROR".to_string()],
            ..web()
        };
        assert_eq!(
            query_string(&config),
            r#"_exists_:request_uri AND host:"web-01" AND level:WARN OR level:ERROR"#
        );
    }

    #[test]
    fn blank_extra_terms_are_dropped() {
        let config = Config {
            ext_terms: vec!["".to_string(), "  ".to_string()],
            ..proxy()
        };
        assert_eq!(query_string(&config), r#"program:"haproxy""#);

        let config = Config {
            ext_terms: vec!["".to_string(), "level:WARN".to_string(), " ".to_string()],
            ..proxy()
        };
        assert_eq!(query_string(&config), r#"program:"haproxy" AND level:WARN"#);
    }

    #[test]
    fn quotes_are_escaped() {
        let config = Config {
            message: some(r#"say "hi" \o/"#),
            ..proxy()
        };
        assert_eq!(
            query_string(&config),
            r#"program:"haproxy" AND message:"say \"hi\" \\o/""#
        );
    }

    #[test]
    fn search_body() {
        let config = Config {
            errors: true,
            correlation_id: some("abc123"),
            from_time: "now-1h".to_string(),
            until_time: "now".to_string(),
            ..primary()
        };

        let body = build(&config);
        let query = body["query"]["filtered"]["query"]["bool"]["should"][0]["query_string"]
            ["query"]
            .as_str()
            .unwrap();

        assert!(query.contains(r#"level:"ERROR""#));
        assert!(query.contains(r#"camel_correlationId:"abc123""#));

        let range = &body["query"]["filtered"]["filter"]["bool"]["must"][0]["range"]["@timestamp"];
        assert_eq!(range, &json!({ "gte": "now-1h", "lte": "now" }));

        assert_eq!(body["fields"], json!(["_source"]));
        assert_eq!(body["size"], json!(100));
        assert_eq!(body["from"], json!(0));
        assert_eq!(
            body["sort"],
            json!([{ "@timestamp": { "order": "desc", "ignore_unmapped": true } }])
        );
        assert_eq!(Endpoint::for_config(&config), Endpoint::Search);
    }

    #[test]
    fn count_body() {
        let config = Config {
            count: true,
            ..primary()
        };

        let body = build(&config);
        let root = body.as_object().unwrap();

        assert!(root.contains_key("query"));
        for key in ["fields", "size", "from", "sort"] {
            assert!(!root.contains_key(key), "unexpected {}", key);
        }
        assert_eq!(Endpoint::for_config(&config), Endpoint::Count);
    }

    #[test]
    fn pagination() {
        let config = Config {
            num_logs: 25,
            offset: 50,
            ..primary()
        };

        let body = build(&config);
        assert_eq!(body["size"], json!(25));
        assert_eq!(body["from"], json!(50));
    }
}
