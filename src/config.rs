use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scraper::Selector;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "sitekit.toml";
const ENV_PREFIX: &str = "SITEKIT";

const DEFAULT_FAVICON_BLOCK: &str = r#"
    <!-- Favicon -->
    <link rel="apple-touch-icon" sizes="180x180" href="/apple-touch-icon.png">
    <link rel="icon" type="image/png" sizes="32x32" href="/favicon-32x32.png">
    <link rel="icon" type="image/png" sizes="16x16" href="/favicon-16x16.png">
    <link rel="manifest" href="/site.webmanifest">
"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site_root: PathBuf,
    pub site_domain: String,
    pub template: TemplateSettings,
    pub favicon: FaviconSettings,
    pub logo: LogoSettings,
    pub images: ImageSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub path: PathBuf,
    pub default_title: String,
    pub pages: Vec<String>,
    pub content_selector: String,
    /// Substrings marking a `<style>` block as already shipped by the template.
    pub boilerplate_signatures: Vec<String>,
    /// Element ids only the template produces; their presence means the page was migrated.
    pub applied_element_ids: Vec<String>,
    pub history_revision: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaviconSettings {
    pub exclude_dirs: Vec<String>,
    pub sentinels: Vec<String>,
    pub block: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogoSettings {
    pub edits: Vec<FileEdit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEdit {
    pub path: PathBuf,
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
    pub jobs: Vec<ImageJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageJob {
    pub slug: String,
    pub prompt: String,
}

impl Settings {
    /// Load `sitekit.toml` (or `path`) and overlay `SITEKIT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Settings> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let built = config::Config::builder()
            .add_source(config::File::from(file).required(path.is_some()))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to load configuration from {:?}", file))?;

        built
            .try_deserialize()
            .context("Invalid sitekit configuration")
    }

    /// Join a relative path onto the site root; absolute paths pass through.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.site_root.join(path)
        }
    }
}

/// `SITEKIT_SITE_ROOT`, `SITEKIT_IMAGES__API_KEY`, `SITEKIT_TEMPLATE__PAGES=a.html,b.html`.
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("template.pages")
        .try_parsing(true)
}

impl TemplateSettings {
    pub fn content_selector(&self) -> Result<Selector> {
        Selector::parse(&self.content_selector).map_err(|e| {
            anyhow::anyhow!("Invalid content selector {:?}: {}", self.content_selector, e)
        })
    }
}

impl ImageSettings {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            site_root: PathBuf::from("."),
            site_domain: "rapidpromemphis.com".to_string(),
            template: TemplateSettings::default(),
            favicon: FaviconSettings::default(),
            logo: LogoSettings::default(),
            images: ImageSettings::default(),
        }
    }
}

impl Default for TemplateSettings {
    fn default() -> Self {
        TemplateSettings {
            path: PathBuf::from("template.html"),
            default_title: "Rapid Pro Maintenance".to_string(),
            pages: strings(&[
                "germantown-kitchen-equipment-repair.html",
                "bartlett-commercial-appliance-repair.html",
                "collierville-restaurant-equipment-service.html",
                "memphis-commercial-oven-repair.html",
                "memphis-ice-machine-service.html",
                "memphis-commercial-refrigeration-services.html",
                "memphis-commercial-fryer-repair.html",
                "memphis-commercial-griddle-repair.html",
                "memphis-commercial-dishwasher-repair.html",
                "memphis-commercial-cooking-equipment-repair.html",
                "memphis-steam-table-repair.html",
            ]),
            content_selector: "main".to_string(),
            boilerplate_signatures: strings(&[
                "--header-height-desktop",
                ".site-header",
                ".site-footer",
                ".mobile-nav",
            ]),
            applied_element_ids: strings(&["site-header", "site-footer"]),
            history_revision: "HEAD~1".to_string(),
        }
    }
}

impl Default for FaviconSettings {
    fn default() -> Self {
        FaviconSettings {
            exclude_dirs: strings(&["rpm-next", "node_modules", ".git", "dashboard"]),
            sentinels: strings(&[
                r#"sizes="180x180" href="/apple-touch-icon.png""#,
                r#"href="/site.webmanifest""#,
            ]),
            block: DEFAULT_FAVICON_BLOCK.to_string(),
        }
    }
}

impl Default for LogoSettings {
    fn default() -> Self {
        let edit = |path: &str, pairs: &[(&str, &str)]| FileEdit {
            path: PathBuf::from(path),
            replacements: pairs
                .iter()
                .map(|(from, to)| Replacement {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        };

        LogoSettings {
            edits: vec![
                edit(
                    "index.html",
                    &[
                        ("--header-height-desktop: 80px;", "--header-height-desktop: 160px;"),
                        ("height: 70px;", "height: 140px;"),
                    ],
                ),
                edit("css/funnel.css", &[("height: 50px;", "height: 100px;")]),
                edit(
                    "css/quick-fixes.css",
                    &[
                        ("height: 60px !important;", "height: 120px !important;"),
                        ("max-width: 200px !important;", "max-width: 400px !important;"),
                    ],
                ),
                edit(
                    "rpm-next/components/layout/Header.tsx",
                    &[
                        ("fontSize: '1.5rem'", "fontSize: '3rem'"),
                        ("fontSize: '2rem'", "fontSize: '4rem'"),
                    ],
                ),
            ],
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        let job = |slug: &str, prompt: &str| ImageJob {
            slug: slug.to_string(),
            prompt: prompt.to_string(),
        };

        ImageSettings {
            api_key: None,
            model: "imagen-3.0-fast-generate-001".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            output_dir: PathBuf::from("images/funnel"),
            timeout_secs: 120,
            jobs: vec![
                job("memphis-commercial-oven-repair", "Professional technician repairing commercial oven in restaurant kitchen"),
                job("memphis-fryer-repair", "Professional technician servicing commercial deep fryer"),
                job("memphis-dishwasher-repair", "Professional technician repairing commercial dishwasher"),
                job("memphis-ice-machine-service", "Professional technician maintaining commercial ice machine"),
                job("memphis-walk-in-cooler-maintenance", "Professional technician inspecting walk-in cooler gaskets"),
                job("memphis-steam-table-repair", "Professional technician repairing commercial steam table"),
                job("memphis-griddle-repair", "Professional technician servicing flat top commercial griddle"),
                job("germantown-kitchen-equipment-repair", "Professional kitchen equipment technician with tools"),
                job("collierville-restaurant-equipment-service", "Professional technician repairing restaurant equipment"),
                job("bartlett-commercial-appliance-repair", "Professional appliance repair technician working on kitchen equipment"),
            ],
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let s = Settings::default();
        assert_eq!(s.site_domain, "rapidpromemphis.com");
        assert_eq!(s.template.pages.len(), 11);
        assert_eq!(s.logo.edits.len(), 4);
        assert_eq!(s.images.jobs.len(), 10);
        assert!(s.template.content_selector().is_ok());
        assert!(s.favicon.sentinels.iter().all(|x| s.favicon.block.contains(x.as_str())));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitekit.toml");
        std::fs::write(
            &path,
            r#"
site_root = "/srv/site"
site_domain = "example.com"

[template]
pages = ["a.html", "b.html"]
history_revision = "main~3"

[favicon]
exclude_dirs = ["vendor"]
"#,
        )
        .unwrap();

        let s = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(s.site_root, PathBuf::from("/srv/site"));
        assert_eq!(s.site_domain, "example.com");
        assert_eq!(s.template.pages, vec!["a.html", "b.html"]);
        assert_eq!(s.template.history_revision, "main~3");
        // untouched keys keep their defaults
        assert_eq!(s.template.default_title, "Rapid Pro Maintenance");
        assert_eq!(s.favicon.exclude_dirs, vec!["vendor"]);
        assert_eq!(s.favicon.sentinels.len(), 2);
    }

    #[test]
    fn environment_overlays_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitekit.toml");
        std::fs::write(&path, "site_domain = \"example.com\"\n").unwrap();

        let vars: config::Map<String, String> = [
            ("SITEKIT_SITE_ROOT", "/srv/site"),
            ("SITEKIT_IMAGES__API_KEY", "k123"),
            ("SITEKIT_TEMPLATE__PAGES", "a.html,b.html"),
            ("OTHER_SITE_ROOT", "/nope"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let s = Settings::load_with(Some(path.as_path()), environment().source(Some(vars))).unwrap();
        assert_eq!(s.site_root, PathBuf::from("/srv/site"));
        assert_eq!(s.site_domain, "example.com");
        assert_eq!(s.images.api_key.as_deref(), Some("k123"));
        assert_eq!(s.template.pages, vec!["a.html", "b.html"]);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(dir.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let s = Settings {
            site_root: PathBuf::from("/srv/site"),
            ..Settings::default()
        };
        assert_eq!(s.resolve("css/funnel.css"), PathBuf::from("/srv/site/css/funnel.css"));
        assert_eq!(s.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn invalid_selector_is_reported() {
        let t = TemplateSettings {
            content_selector: "main[".to_string(),
            ..TemplateSettings::default()
        };
        assert!(t.content_selector().is_err());
    }
}
