#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ladok_canvas_core::config::{LadokEndpoints, LadokEnvironment};
use ladok_canvas_core::contract::{Body, HttpRequest, HttpResponse, Method, MockHttpTransport};
use ladok_canvas_core::ladok::LadokSession;
use serde_json::{json, Value};

pub const GUI: &str = "https://www.start.ladok.se/gui";
pub const PROXY: &str = "https://www.start.ladok.se/gui/proxy";
pub const SP_LOGIN: &str = "https://www.start.ladok.se/Shibboleth.sso/Login";
pub const IDP_SSO: &str = "https://saml-5.sys.kth.se/idp/profile/SAML2/Redirect/SSO?execution=e1s1";
pub const CAS_LOGIN: &str = "https://login.kth.se/login?service=ladok";
pub const SAML_POST: &str = "https://www.start.ladok.se/Shibboleth.sso/SAML2/POST";
pub const XSRF: &str = "xsrf-123";

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

struct Route {
    method: Method,
    url: String,
    prefix: bool,
    handler: Handler,
}

/// Canned responses keyed by method and URL; the first matching route wins.
#[derive(Default)]
pub struct Routes {
    routes: Vec<Route>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, method: Method, url: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            url: url.to_string(),
            prefix: false,
            handler: Box::new(handler),
        });
        self
    }

    pub fn on_prefix<F>(mut self, method: Method, url: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            url: url.to_string(),
            prefix: true,
            handler: Box::new(handler),
        });
        self
    }

    /// Append `other`'s routes after these.
    pub fn then(mut self, other: Routes) -> Self {
        self.routes.extend(other.routes);
        self
    }

    pub fn json(self, method: Method, url: &str, value: Value) -> Self {
        self.on(method, url, move |_| json_ok(&value))
    }

    /// Ladok GET on a proxy path.
    pub fn ladok(self, path: &str, value: Value) -> Self {
        self.json(Method::Get, &format!("{PROXY}{path}"), value)
    }

    /// The whole sign-in sequence, ending in a successful assertion post.
    pub fn handshake(self) -> Self {
        self.handshake_until_credentials()
            .on(Method::Post, CAS_LOGIN, |_| ok(assertion_page()))
            .on(Method::Post, SAML_POST, |_| ok("<html><body>Ladok</body></html>"))
            .ladok("/resultat/grunddata/betygsskala", grade_scales())
    }

    /// Sign-in routes up to and including the CAS login form.
    pub fn handshake_until_credentials(self) -> Self {
        self.on(Method::Get, &format!("{GUI}/loggain"), |_| ok("<html/>"))
            .on(Method::Get, &format!("{GUI}/shiblogin"), |_| HttpResponse {
                status: 200,
                url: "https://www.start.ladok.se/Shibboleth.sso/DS?entityID=https%3A%2F%2Fwww.start.ladok.se%2Fshibboleth&return=https%3A%2F%2Fwww.start.ladok.se%2FShibboleth.sso%2FLogin%3FSAMLDS%3D1%26target%3Dss%253Amem%253Aabc".to_string(),
                headers: vec![],
                body: "<html/>".to_string(),
            })
            .on_prefix(Method::Get, SP_LOGIN, |_| ok("<html>local storage probe</html>"))
            .on(Method::Post, IDP_SSO, |_| ok(login_page()))
    }

    fn respond(&self, request: &HttpRequest) -> HttpResponse {
        let route = self.routes.iter().find(|r| {
            r.method == request.method
                && if r.prefix {
                    request.url.starts_with(&r.url)
                } else {
                    request.url == r.url
                }
        });
        let mut response = match route {
            Some(route) => (route.handler)(request),
            None => HttpResponse {
                status: 404,
                body: format!("no route for {:?} {}", request.method, request.url),
                ..HttpResponse::default()
            },
        };
        if response.url.is_empty() {
            response.url = request.url.clone();
        }
        response
    }
}

/// Every request the mock transport received, in order.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<HttpRequest>>>);

impl Recorded {
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn find(&self, method: Method, url: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }
}

pub fn transport(routes: Routes) -> (MockHttpTransport, Recorded) {
    let recorded = Recorded::default();
    let log = recorded.clone();
    let mut mock = MockHttpTransport::new();
    mock.expect_send().returning(move |request: HttpRequest| {
        let response = routes.respond(&request);
        log.0.lock().unwrap().push(request);
        Ok(response)
    });
    mock.expect_cookie().returning(|_url: &str, name: &str| {
        (name == "XSRF-TOKEN").then(|| XSRF.to_string())
    });
    (mock, recorded)
}

pub fn endpoints() -> LadokEndpoints {
    LadokEndpoints::kth(LadokEnvironment::Production)
}

/// A signed-in session over `routes` (the handshake routes are added).
pub async fn signed_in(routes: Routes) -> (LadokSession<MockHttpTransport>, Recorded) {
    let (mock, recorded) = transport(routes.handshake());
    let mut session = LadokSession::new(mock, endpoints());
    session
        .sign_in("alba", "secret")
        .await
        .expect("sign-in against canned routes");
    (session, recorded)
}

pub fn ok(body: impl Into<String>) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: body.into(),
        ..HttpResponse::default()
    }
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        ..HttpResponse::default()
    }
}

pub fn json_ok(value: &Value) -> HttpResponse {
    ok(value.to_string())
}

pub fn body_json(request: &HttpRequest) -> Value {
    match &request.body {
        Body::Json(v) => v.clone(),
        other => panic!("expected a JSON body, got {other:?}"),
    }
}

pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub fn login_page() -> String {
    r#"<html><body>
<form id="fm1" action="/login?service=ladok" method="post">
<input type="hidden" name="lt" value="LT-42-abc" />
<input type="hidden" name="execution" value="e1s2" />
</form></body></html>"#
        .to_string()
}

pub fn assertion_page() -> String {
    format!(
        r#"<html><body onload="document.forms[0].submit()">
<form action="{}" method="post">
<input type="hidden" name="RelayState" value="ss&#x3a;mem&#x3a;abc"/>
<input type="hidden" name="SAMLResponse" value="PHNhbWxwOlJlc3BvbnNlPg&#61;&#61;"/>
</form></body></html>"#,
        SAML_POST.replace('/', "&#x2f;")
    )
}

pub fn grade_scales() -> Value {
    json!({
        "Betygsskala": [
            {
                "ID": "1", "Kod": "AF", "Benamning": {"sv": "AF", "en": "AF"},
                "Betygsgrad": [
                    {"ID": 101, "Kod": "A", "GiltigSomSlutbetyg": true},
                    {"ID": 102, "Kod": "B", "GiltigSomSlutbetyg": true},
                    {"ID": 103, "Kod": "C", "GiltigSomSlutbetyg": true},
                    {"ID": 104, "Kod": "D", "GiltigSomSlutbetyg": true},
                    {"ID": 105, "Kod": "E", "GiltigSomSlutbetyg": true},
                    {"ID": 106, "Kod": "Fx", "GiltigSomSlutbetyg": false},
                    {"ID": 107, "Kod": "F", "GiltigSomSlutbetyg": false}
                ]
            },
            {
                "ID": 2, "Kod": "PF", "Benamning": {"sv": "PF", "en": "PF"},
                "Betygsgrad": [
                    {"ID": "201", "Kod": "P", "GiltigSomSlutbetyg": true},
                    {"ID": "202", "Kod": "F", "GiltigSomSlutbetyg": false}
                ]
            }
        ]
    })
}

pub fn student(uid: &str, first: &str, last: &str, pnr: &str) -> Value {
    json!({"Uid": uid, "Fornamn": first, "Efternamn": last, "Personnummer": pnr, "Avliden": false})
}

/// A leaf of a study structure.
pub fn leaf(code: &str, en: Option<&str>, sv: &str, end: Option<&str>, cancelled: bool) -> Value {
    let mut name = json!({"sv": sv});
    if let Some(en) = en {
        name["en"] = json!(en);
    }
    json!({
        "Utbildningsinformation": {"Utbildningskod": code, "Benamning": name},
        "Tillfallesdeltagande": {
            "Utbildningsinformation": {
                "Utbildningskod": code,
                "Benamning": name,
                "Studieperiod": {"Startdatum": "2024-08-26", "Slutdatum": end},
                "Utbildningstillfalleskod": format!("{code}-S1"),
                "Utbildningstillfallestyp": {"Kod": "PRG"}
            },
            "Aterbud": cancelled,
            "Avklarad": false
        },
        "Barn": []
    })
}

pub fn branch(code: &str, children: Vec<Value>) -> Value {
    json!({
        "Utbildningsinformation": {"Utbildningskod": code, "Benamning": {"sv": code}},
        "Barn": children
    })
}

pub fn structure(trees: Vec<Value>) -> Value {
    json!({"Studiestrukturer": trees, "link": []})
}

pub fn education_types() -> Value {
    json!({"Utbildningstyp": [
        {"Kod": "PRG", "Benamning": {"en": "Programme", "sv": "Program"}},
        {"Kod": "KRS", "Benamning": {"en": "Course", "sv": "Kurs"}}
    ]})
}
