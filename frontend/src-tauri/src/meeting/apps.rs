use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Bundle-id prefix shared by the Zoom family of helper processes.
pub const ZOOM_BUNDLE_PREFIX: &str = "us.zoom.";

/// A catalog-listed application whose activity indicates an ongoing
/// videoconference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingApp {
    pub id: String,
    pub display_name: String,
    pub bundle_id: Option<String>,
    pub process_name: String,
    pub browser_based: bool,
}

/// The fixed catalog shipped with the app, keyed by `enabled_apps` ids in
/// `DetectorConfig`.
pub fn builtin_catalog() -> Vec<MeetingApp> {
    vec![
        MeetingApp {
            id: "zoom".into(),
            display_name: "Zoom".into(),
            bundle_id: Some("us.zoom.xos".into()),
            process_name: "zoom.us".into(),
            browser_based: false,
        },
        MeetingApp {
            id: "teams".into(),
            display_name: "Microsoft Teams".into(),
            bundle_id: Some("com.microsoft.teams2".into()),
            process_name: "Teams".into(),
            browser_based: false,
        },
        MeetingApp {
            id: "meet".into(),
            display_name: "Google Meet".into(),
            bundle_id: None,
            process_name: "Google Meet".into(),
            browser_based: true,
        },
        MeetingApp {
            id: "slack".into(),
            display_name: "Slack".into(),
            bundle_id: Some("com.tinyspeck.slackmacgap".into()),
            process_name: "Slack".into(),
            browser_based: false,
        },
        MeetingApp {
            id: "discord".into(),
            display_name: "Discord".into(),
            bundle_id: Some("com.hnc.Discord".into()),
            process_name: "Discord".into(),
            browser_based: false,
        },
    ]
}

/// Resolves process/bundle/window observations against the catalog plus
/// user-enabled custom entries. Matching rules follow the ordered list in
/// the process-set monitor's contract.
pub struct MeetingAppCatalog {
    apps: Vec<MeetingApp>,
    browser_prefixes: HashSet<String>,
}

impl MeetingAppCatalog {
    pub fn new(enabled_apps: &HashSet<String>, browser_apps: &HashSet<String>, custom: Vec<MeetingApp>) -> Self {
        let mut apps: Vec<MeetingApp> = builtin_catalog()
            .into_iter()
            .filter(|app| enabled_apps.contains(&app.id))
            .collect();
        apps.extend(custom);

        Self {
            apps,
            browser_prefixes: browser_apps.clone(),
        }
    }

    pub fn apps(&self) -> &[MeetingApp] {
        &self.apps
    }

    /// Rule 1 + 2: exact bundle-id match, then the Zoom-family prefix
    /// special case.
    pub fn match_bundle_id(&self, bundle_id: &str) -> Option<&MeetingApp> {
        if let Some(app) = self
            .apps
            .iter()
            .find(|app| app.bundle_id.as_deref() == Some(bundle_id))
        {
            return Some(app);
        }

        if bundle_id.starts_with(ZOOM_BUNDLE_PREFIX) {
            return self.apps.iter().find(|app| app.id == "zoom");
        }

        None
    }

    /// Rule 3: case-insensitive substring match on process-name or
    /// display-name. Used as a fallback for any process whose probe
    /// couldn't supply a bundle id (rules 1/2 take priority when it can).
    pub fn match_process_name(&self, process_name: &str) -> Option<&MeetingApp> {
        let needle = process_name.to_lowercase();
        self.apps.iter().find(|app| {
            app.process_name.to_lowercase().contains(&needle)
                || needle.contains(&app.process_name.to_lowercase())
                || app.display_name.to_lowercase().contains(&needle)
                || needle.contains(&app.display_name.to_lowercase())
        })
    }

    /// True if `bundle_id` belongs to a recognised browser or one of its
    /// helper processes.
    pub fn is_browser(&self, display_name_or_bundle: &str) -> bool {
        let haystack = display_name_or_bundle.to_lowercase();
        self.browser_prefixes
            .iter()
            .any(|prefix| haystack.contains(&prefix.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MeetingAppCatalog {
        let enabled: HashSet<String> = ["zoom", "teams", "slack"].into_iter().map(String::from).collect();
        let browsers: HashSet<String> = ["Chrome", "Safari"].into_iter().map(String::from).collect();
        MeetingAppCatalog::new(&enabled, &browsers, vec![])
    }

    #[test]
    fn matches_zoom_by_bundle_id() {
        let cat = catalog();
        assert_eq!(cat.match_bundle_id("us.zoom.xos").unwrap().id, "zoom");
    }

    #[test]
    fn matches_zoom_family_prefix() {
        let cat = catalog();
        assert_eq!(cat.match_bundle_id("us.zoom.helper").unwrap().id, "zoom");
    }

    #[test]
    fn matches_process_name_substring() {
        let cat = catalog();
        assert_eq!(cat.match_process_name("Microsoft Teams").unwrap().id, "teams");
        assert_eq!(cat.match_process_name("zoom.us").unwrap().id, "zoom");
    }

    #[test]
    fn matches_custom_app_by_bundle_id() {
        let enabled: HashSet<String> = ["zoom"].into_iter().map(String::from).collect();
        let cat = MeetingAppCatalog::new(
            &enabled,
            &HashSet::new(),
            vec![MeetingApp {
                id: "acme-meet".into(),
                display_name: "Acme Meet".into(),
                bundle_id: Some("com.acme.meet".into()),
                process_name: "AcmeMeet".into(),
                browser_based: false,
            }],
        );
        assert_eq!(cat.match_bundle_id("com.acme.meet").unwrap().id, "acme-meet");
    }

    #[test]
    fn recognises_browsers() {
        let cat = catalog();
        assert!(cat.is_browser("Google Chrome"));
        assert!(!cat.is_browser("Microsoft Teams"));
    }
}
