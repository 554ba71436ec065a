//! # Ladok sign-in through the KTH Shibboleth federation
//!
//! The web GUI has no API login; a session is obtained the way a browser
//! obtains one:
//!
//! 1. `{gui}/loggain` and `{gui}/shiblogin` redirect to the discovery service;
//!    the `return` parameter of the final URL is the SP's login endpoint.
//! 2. That endpoint, with the IdP entity id appended, starts the SAML flow.
//!    The IdP first asks for browser local-storage state, which is posted as
//!    empty placeholders.
//! 3. The CAS login form carries an `lt` ticket and an `execution` token.
//! 4. Credentials are posted to the form action on the login host.
//! 5. On success the response is an auto-submit form holding `RelayState`
//!    and `SAMLResponse`; without it the credentials were rejected.
//! 6. Posting the assertion back to the SP completes the federation.
//! 7. The grade-scale reference data is fetched as the first API call.
//!
//! Cookies collected along the way stay in the transport.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use tracing::{debug, info};

use crate::config::LadokEndpoints;
use crate::contract::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{Error, Result};
use crate::ladok::grades::{GradeScaleSet, RawGradeScales};

pub(crate) const ACCEPT: &str = "application/vnd.ladok-resultat+json, application/vnd.ladok-kataloginformation+json, application/vnd.ladok-studentinformation+json, application/vnd.ladok-studiedeltagande+json, application/vnd.ladok-utbildningsinformation+json, application/vnd.ladok-examen+json, application/vnd.ladok-extintegration+json, application/vnd.ladok-uppfoljning+json, application/vnd.ladok-extra+json, application/json, text/plain";

const NOT_IN_LADOK: &str = "Din användare finns inte i Ladok";

static LOGIN_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<form id="fm1" action="(.*?)" method="post">"#).unwrap());
static LT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<input type="hidden" name="lt" value="(.*?)" />"#).unwrap());
static EXECUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<input type="hidden" name="execution" value="(.*?)" />"#).unwrap());
static ASSERTION_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<form action="(.*?)" method="post">"#).unwrap());
static RELAY_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<input type="hidden" name="RelayState" value="([^"]+)"/>"#).unwrap());
static SAML_RESPONSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<input type="hidden" name="SAMLResponse" value="(.*?)"/>"#).unwrap());
static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());

/// Run the handshake and return the grade scales loaded with the new session.
pub async fn handshake<T>(
    transport: &T,
    endpoints: &LadokEndpoints,
    username: &str,
    password: &str,
) -> Result<GradeScaleSet>
where
    T: HttpTransport + ?Sized,
{
    let gui = endpoints.gui.trim_end_matches('/');
    checked(transport.send(HttpRequest::get(format!("{gui}/loggain"))).await?)?;
    let discovery = checked(transport.send(HttpRequest::get(format!("{gui}/shiblogin"))).await?)?;
    let sp_login = return_parameter(&discovery.url)?;
    debug!(sp_login = %sp_login, "Found service provider login endpoint");

    checked(
        transport
            .send(HttpRequest::get(format!(
                "{sp_login}&entityID={}",
                endpoints.idp_entity_id
            )))
            .await?,
    )?;

    let login_page = checked(
        transport
            .send(HttpRequest::post_form(&endpoints.idp_sso, browser_state_placeholders()))
            .await?,
    )?;
    let action = capture(&LOGIN_FORM, &login_page, "login form action")?;
    let lt = capture(&LT, &login_page, "lt ticket")?;
    let execution = capture(&EXECUTION, &login_page, "execution token")?;

    let credentials = vec![
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
        ("lt".to_string(), lt),
        ("execution".to_string(), execution),
        ("_eventId".to_string(), "submit".to_string()),
        ("submit".to_string(), "Logga in".to_string()),
    ];
    let login_url = format!("{}{}", endpoints.login_host.trim_end_matches('/'), action);
    let assertion_page = transport
        .send(HttpRequest::post_form(login_url, credentials))
        .await?;

    let Some(action) = ASSERTION_FORM
        .captures(&assertion_page.body)
        .map(|c| html_unescape(&c[1]))
    else {
        info!(username, "Identity provider did not return an assertion form");
        return Err(Error::InvalidCredentials);
    };
    let relay_state = html_unescape(&capture(&RELAY_STATE, &assertion_page, "RelayState")?);
    let saml_response = html_unescape(&capture(&SAML_RESPONSE, &assertion_page, "SAMLResponse")?);

    let landing = transport
        .send(HttpRequest::post_form(
            action,
            vec![
                ("RelayState".to_string(), relay_state),
                ("SAMLResponse".to_string(), saml_response),
            ],
        ))
        .await?;
    if landing.body.contains(NOT_IN_LADOK) {
        return Err(Error::NotAuthorized);
    }
    checked(landing)?;

    let scales_url = format!("{}/resultat/grunddata/betygsskala", endpoints.proxy());
    let scales: RawGradeScales = transport
        .send(HttpRequest::get(scales_url).header("Accept", ACCEPT))
        .await?
        .success_json()?;
    let scales = GradeScaleSet::from_reference_data(&scales)?;
    info!(username, grade_scales = scales.all().len(), "Signed in to Ladok");
    Ok(scales)
}

fn browser_state_placeholders() -> Vec<(String, String)> {
    [
        ("shib_idp_ls_exception.shib_idp_session_ss", ""),
        ("shib_idp_ls_success.shib_idp_session_ss", "true"),
        ("shib_idp_ls_value.shib_idp_session_ss", ""),
        ("shib_idp_ls_exception.shib_idp_persistent_ss", ""),
        ("shib_idp_ls_success.shib_idp_persistent_ss", "true"),
        ("shib_idp_ls_value.shib_idp_persistent_ss", ""),
        ("shib_idp_ls_supported", "true"),
        ("_eventId_proceed", ""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn checked(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(Error::remote(
            &response.url,
            format!("HTTP status {} during sign-in", response.status),
        ))
    }
}

fn capture(re: &Regex, response: &HttpResponse, what: &str) -> Result<String> {
    re.captures(&response.body)
        .map(|c| c[1].to_string())
        .ok_or_else(|| Error::remote(&response.url, format!("sign-in page has no {what}")))
}

/// Decoded `return` query parameter of the discovery-service URL.
fn return_parameter(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::remote(url, format!("bad redirect URL: {e}")))?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "return")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| Error::remote(url, "redirect URL has no return parameter"))
}

/// Replace named and numeric character references.
pub fn html_unescape(input: &str) -> String {
    ENTITY
        .replace_all(input, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_handles_named_and_numeric_references() {
        assert_eq!(
            html_unescape("https://www.start.ladok.se/Shibboleth.sso/SAML2/POST?a=1&amp;b=2"),
            "https://www.start.ladok.se/Shibboleth.sso/SAML2/POST?a=1&b=2"
        );
        assert_eq!(html_unescape("ss&#58;mem&#x3a;x"), "ss:mem:x");
        assert_eq!(html_unescape("&unknown; &lt;ok&gt;"), "&unknown; <ok>");
    }

    #[test]
    fn return_parameter_is_percent_decoded() {
        let url = "https://www.start.ladok.se/Shibboleth.sso/DS?entityID=x&return=https%3A%2F%2Fwww.start.ladok.se%2FShibboleth.sso%2FLogin%3FSAMLDS%3D1%26target%3Dss%253Amem";
        assert_eq!(
            return_parameter(url).unwrap(),
            "https://www.start.ladok.se/Shibboleth.sso/Login?SAMLDS=1&target=ss%3Amem"
        );
        assert!(return_parameter("https://www.start.ladok.se/gui/").is_err());
    }
}
