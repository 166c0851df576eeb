//! Role classification: a flat, ordered list of (app, role, predicate) rules.
//! The first rule whose predicate holds decides the role key; later rules are never consulted.

use crate::config::{role_key, AgentConfig, ConfigError};
use crate::types::RawSample;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRule {
    pub app: String,
    pub role: String,
    // case-sensitive substring checks; at least one is set
    pub name_contains: Option<String>,
    pub cmdline_contains: Option<String>,
    key: String,
}

impl RoleRule {
    pub fn new(
        app: impl Into<String>,
        role: impl Into<String>,
        name_contains: Option<String>,
        cmdline_contains: Option<String>,
    ) -> Self {
        let app = app.into();
        let role = role.into();
        let key = role_key(&app, &role);
        Self {
            app,
            role,
            name_contains,
            cmdline_contains,
            key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name predicate first, then command line predicate.
    pub fn matches(&self, name: &str, cmdline: &str) -> bool {
        if let Some(s) = &self.name_contains {
            if name.contains(s.as_str()) {
                return true;
            }
        }
        if let Some(s) = &self.cmdline_contains {
            if cmdline.contains(s.as_str()) {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<RoleRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<RoleRule>) -> Self {
        Self { rules }
    }

    /// Flattens applications then roles in declaration order.
    pub fn from_config(cfg: &AgentConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let rules = cfg
            .applications
            .iter()
            .flat_map(|app| {
                app.roles.iter().map(move |r| {
                    RoleRule::new(
                        app.name.clone(),
                        r.name.clone(),
                        r.process_name.clone(),
                        r.cmdline.clone(),
                    )
                })
            })
            .collect();
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RoleRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn classify_parts(&self, name: &str, cmdline: &[String]) -> Option<&str> {
        let joined = cmdline.join(" ");
        self.rules
            .iter()
            .find(|r| r.matches(name, &joined))
            .map(RoleRule::key)
    }

    pub fn classify(&self, sample: &RawSample) -> Option<&str> {
        self.classify_parts(&sample.name, &sample.cmdline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(name: &str, cmd: &[&str]) -> RawSample {
        RawSample {
            name: name.into(),
            cmdline: cmd.iter().map(|s| s.to_string()).collect(),
            ..RawSample::default()
        }
    }

    fn rules() -> RuleSet {
        RuleSet::new(vec![
            RoleRule::new("cpp_service", "worker", Some("cpp_worker".into()), None),
            RoleRule::new("cpp_service", "master", Some("cpp_master".into()), None),
            RoleRule::new("jvm", "any", Some("java".into()), Some("-jar".into())),
        ])
    }

    #[test]
    fn first_match_wins() {
        let rs = RuleSet::new(vec![
            RoleRule::new("a", "first", Some("serv".into()), None),
            RoleRule::new("a", "second", Some("server".into()), None),
        ]);
        assert_eq!(rs.classify(&sample("server", &[])), Some("a_first"));
    }

    #[test]
    fn substring_not_equality() {
        let rs = rules();
        assert_eq!(rs.classify(&sample("openjdk-java17", &[])), Some("jvm_any"));
        assert_eq!(rs.classify(&sample("cpp_worker", &[])), Some("cpp_service_worker"));
        assert_eq!(rs.classify(&sample("cpp_master", &[])), Some("cpp_service_master"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(rules().classify(&sample("JAVA", &[])), None);
    }

    #[test]
    fn cmdline_predicate_spans_joined_tokens() {
        let rs = RuleSet::new(vec![RoleRule::new(
            "svc",
            "api",
            None,
            Some("serve --port".into()),
        )]);
        assert_eq!(
            rs.classify(&sample("python3", &["python3", "app.py", "serve", "--port", "80"])),
            Some("svc_api")
        );
    }

    #[test]
    fn empty_cmdline_classifies_without_fault() {
        let rs = rules();
        assert_eq!(rs.classify(&sample("kworker/0:1", &[])), None);
        assert_eq!(rs.classify(&sample("java", &[])), Some("jvm_any"));
    }

    #[test]
    fn no_rule_means_no_role() {
        assert_eq!(rules().classify(&sample("bash", &["bash", "-l"])), None);
        assert_eq!(RuleSet::default().classify(&sample("java", &[])), None);
    }

    #[test]
    fn from_config_keeps_declaration_order() {
        let cfg = AgentConfig::from_json(
            r#"{"applications": [
                {"name": "b", "roles": [{"name": "x", "process_name": "p"}]},
                {"name": "a", "roles": [{"name": "y", "cmdline": "p"}, {"name": "z", "process_name": "q"}]}
            ]}"#,
        )
        .unwrap();
        let rs = RuleSet::from_config(&cfg).unwrap();
        let keys: Vec<&str> = rs.rules().iter().map(RoleRule::key).collect();
        assert_eq!(keys, vec!["b_x", "a_y", "a_z"]);
    }

    proptest! {
        #[test]
        fn earliest_matching_rule_decides(
            needles in proptest::collection::vec("[a-c]{1,2}", 1..6),
            name in "[a-c]{0,6}",
        ) {
            let rs = RuleSet::new(
                needles
                    .iter()
                    .enumerate()
                    .map(|(i, n)| RoleRule::new("app", format!("r{i}"), Some(n.clone()), None))
                    .collect(),
            );
            let expected = needles
                .iter()
                .position(|n| name.contains(n.as_str()))
                .map(|i| format!("app_r{i}"));
            prop_assert_eq!(rs.classify_parts(&name, &[]).map(str::to_string), expected);
        }
    }
}
