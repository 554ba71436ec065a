use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Contents of the JSON configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub ladok: LadokConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub host: String,
    pub access_token: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LadokConfig {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

// Secrets stay out of debug output.
impl std::fmt::Debug for CanvasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasConfig")
            .field("host", &self.host)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for LadokConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LadokConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            canvas_host = %self.canvas.host,
            ladok_username = %self.ladok.username,
            password_in_file = self.ladok.password.is_some(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

/// Which Ladok installation to sign in to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LadokEnvironment {
    #[default]
    Production,
    Test,
}

/// Every host the Ladok handshake and API calls touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadokEndpoints {
    /// Ladok web GUI root, e.g. `https://www.start.ladok.se/gui`.
    pub gui: String,
    /// Shibboleth entity id of the university identity provider.
    pub idp_entity_id: String,
    /// IdP SSO endpoint that accepts the browser-state placeholders.
    pub idp_sso: String,
    /// Host of the CAS login form.
    pub login_host: String,
}

impl LadokEndpoints {
    /// KTH preset.
    pub fn kth(environment: LadokEnvironment) -> Self {
        let gui = match environment {
            LadokEnvironment::Production => "https://www.start.ladok.se/gui",
            LadokEnvironment::Test => "https://www.test.ladok.se/gui",
        };
        Self {
            gui: gui.to_string(),
            idp_entity_id: "https://saml.sys.kth.se/idp/shibboleth".to_string(),
            idp_sso: "https://saml-5.sys.kth.se/idp/profile/SAML2/Redirect/SSO?execution=e1s1"
                .to_string(),
            login_host: "https://login.kth.se".to_string(),
        }
    }

    /// REST proxy root, `{gui}/proxy`.
    pub fn proxy(&self) -> String {
        format!("{}/proxy", self.gui.trim_end_matches('/'))
    }

    /// Origin used for `Referer`/`Origin` headers and cookie lookup.
    pub fn origin(&self) -> String {
        let gui = self.gui.trim_end_matches('/');
        gui.strip_suffix("/gui").unwrap_or(gui).to_string()
    }
}

/// Canvas API base URL; `use_http` is for the container environment without TLS.
pub fn canvas_base_url(host: &str, use_http: bool) -> String {
    let scheme = if use_http { "http" } else { "https" };
    format!("{scheme}://{}/api/v1", host.trim_end_matches('/'))
}
