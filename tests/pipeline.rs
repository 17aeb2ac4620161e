use std::sync::{Arc, Mutex};
use std::time::Duration;

use actio::{
    ActionResult, App, AppContext, Config, Cookie, Format, Locale, Response, StatusCode,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};

fn get(uri: &str) -> http::Request<Full<Bytes>> {
    http::Request::builder().uri(uri).body(Full::new(Bytes::new())).unwrap()
}

async fn body_of(resp: http::Response<actio::Body>) -> Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

async fn echo_path(ctx: AppContext) -> String {
    format!("you asked for {}", ctx.request().path())
}

#[tokio::test]
async fn action_result_reaches_the_client() {
    let app = Arc::new(App::new(echo_path));
    let resp = app.dispatch(get("/hello")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(resp.headers()["content-language"], "en-US");
    assert_eq!(body_of(resp).await, "you asked for /hello");
}

#[tokio::test]
async fn interceptors_run_in_priority_order() {
    let trace = Arc::new(Mutex::new(Vec::new()));

    let t = |name: &'static str| {
        let trace = Arc::clone(&trace);
        move |_ctx: AppContext| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push(name);
                None::<ActionResult>
            }
        }
    };
    let tagged = |name: &'static str| {
        let trace = Arc::clone(&trace);
        move |_ctx: AppContext, result: ActionResult| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push(name);
                result.with_header("x-after", name)
            }
        }
    };

    let app = App::new(echo_path)
        .before(10, t("b10"))
        .before(-5, t("b-5"))
        .before(10, t("b10-second"))
        .after(2, tagged("a2"))
        .after(1, tagged("a1"));

    let resp = Arc::new(app).dispatch(get("/")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let after: Vec<_> = resp.headers().get_all("x-after").iter().collect();
    assert_eq!(after, ["a1", "a2"]);
    assert_eq!(*trace.lock().unwrap(), ["b-5", "b10", "b10-second", "a1", "a2"]);
}

#[tokio::test]
async fn before_interceptor_can_short_circuit() {
    let reached = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&reached);

    let app = App::new(move |_ctx: AppContext| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock().unwrap() = true;
            "secret"
        }
    })
    .before(0, |ctx: AppContext| async move {
        match ctx.request().header("x-token") {
            Some("letmein") => None,
            _ => Some(ActionResult::status(StatusCode::UNAUTHORIZED)),
        }
    })
    .after(0, |_ctx: AppContext, result: ActionResult| async move {
        result.with_header("x-checked", "yes")
    });
    let app = Arc::new(app);

    let resp = Arc::clone(&app).dispatch(get("/")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["x-checked"], "yes");
    assert!(!*reached.lock().unwrap());

    let req = http::Request::builder()
        .header("x-token", "letmein")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let resp = app.dispatch(req).await;
    assert_eq!(body_of(resp).await, "secret");
    assert!(*reached.lock().unwrap());
}

#[tokio::test]
async fn attributes_flow_from_interceptor_to_action() {
    let app = App::new(|ctx: AppContext| async move {
        ctx.attribute("user").unwrap_or_else(|| "anonymous".into())
    })
    .before(0, |ctx: AppContext| async move {
        if let Some(user) = ctx.request().cookie("user") {
            ctx.set_attribute("user", user);
        }
        None::<ActionResult>
    });

    let req = http::Request::builder()
        .header("cookie", "user=ada; theme=dark")
        .body(Full::new(Bytes::new()))
        .unwrap();
    assert_eq!(body_of(Arc::new(app).dispatch(req).await).await, "ada");
}

#[tokio::test]
async fn locale_negotiation_and_configured_default() {
    let config = Config { default_locale: "fr-CA".parse::<Locale>().unwrap(), ..Config::default() };
    let app = Arc::new(App::new(|ctx: AppContext| async move { ctx.locale().to_string() }).with_config(config));

    let resp = Arc::clone(&app).dispatch(get("/")).await;
    assert_eq!(resp.headers()["content-language"], "fr-CA");
    assert_eq!(body_of(resp).await, "fr-CA");

    let req = http::Request::builder()
        .header("accept-language", "ja;q=0.3, es-MX")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let resp = app.dispatch(req).await;
    assert_eq!(resp.headers()["content-language"], "es-MX");
}

#[tokio::test]
async fn streaming_action_writes_through_the_context() {
    let app = App::new(|ctx: AppContext| async move {
        let mut resp = ctx.response().await;
        resp.content_format(Format::EventStream).add_cookie(&Cookie::new("seen", "1")?);
        let mut out = resp.output_stream()?;
        for i in 0..3 {
            out.write(format!("data: {i}\n\n")).await?;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        out.close()?;
        Ok::<_, actio::Error>(ActionResult::handled())
    });

    let resp = Arc::new(app).dispatch(get("/events")).await;
    assert_eq!(resp.headers()["content-type"], "text/event-stream; charset=utf-8");
    assert_eq!(resp.headers()["set-cookie"], "seen=1");
    assert_eq!(body_of(resp).await, "data: 0\n\ndata: 1\n\ndata: 2\n\n");
}

#[tokio::test]
async fn mutations_after_start_are_ignored() {
    let app = App::new(|ctx: AppContext| async move {
        let mut resp = ctx.response().await;
        resp.locale(&"it-IT".parse::<Locale>()?);
        resp.output_stream()?.write("partial ").await?;

        resp.locale(&"de-DE".parse::<Locale>()?)
            .character_encoding("latin1")
            .status(StatusCode::IM_A_TEAPOT);
        assert_eq!(resp.current_locale().map(ToString::to_string).as_deref(), Some("it-IT"));
        assert_eq!(resp.character_encoding_value(), Some("utf-8"));
        assert!(resp.send_error_status(StatusCode::BAD_GATEWAY).await.is_err());
        drop(resp);

        Ok::<_, actio::Error>(ActionResult::text("rest"))
    });

    let resp = Arc::new(app).dispatch(get("/")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-language"], "it-IT");
    assert_eq!(body_of(resp).await, "partial rest");
}

#[tokio::test]
async fn errors_and_options_map_to_statuses() {
    let app = Arc::new(App::new(|ctx: AppContext| async move {
        match ctx.request().query("case") {
            Some("missing") => Err(actio::Error::NotFound { collection: "x".into(), id: "1".into() }),
            Some("bad") => Err(actio::Error::Arity { expected: 1, actual: 0 }),
            Some("none") => Ok(None),
            _ => Ok(Some(ActionResult::redirect("/elsewhere"))),
        }
    }));

    let status = |uri: &'static str| {
        let app = Arc::clone(&app);
        async move { app.dispatch(get(uri)).await }
    };

    assert_eq!(status("/?case=missing").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(status("/?case=bad").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(status("/?case=none").await.status(), StatusCode::NOT_FOUND);
    let redirect = status("/").await;
    assert_eq!(redirect.status(), StatusCode::FOUND);
    assert_eq!(redirect.headers()["location"], "/elsewhere");
}

#[tokio::test]
async fn result_that_fails_to_apply_becomes_a_bare_500() {
    let app = App::new(|_ctx: AppContext| async move {
        Ok::<_, actio::Error>(
            ActionResult::builder()
                .cookie(Cookie::new("sid", "1")?)
                .header("bad name", "v")
                .text("never sent"),
        )
    });

    let resp = Arc::new(app).dispatch(get("/")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!resp.headers().contains_key("set-cookie"));
    assert_eq!(resp.headers()["content-language"], "en-US");
    assert_eq!(resp.headers()["content-length"], "21");
    assert_eq!(body_of(resp).await, "Internal Server Error");
}

#[tokio::test]
async fn panicking_action_becomes_500() {
    let app = App::new(|ctx: AppContext| async move {
        if ctx.request().path() == "/boom" {
            panic!("boom");
        }
        "fine"
    });
    let resp = Arc::new(app).dispatch(get("/boom")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn json_request_and_response() {
    #[derive(serde::Deserialize, serde::Serialize)]
    struct Point { x: i32, y: i32 }

    let app = App::new(|ctx: AppContext| async move {
        let p: Point = ctx.request().json()?;
        Ok::<_, actio::Error>(ActionResult::render_json(&Point { x: p.y, y: p.x }))
    });
    let app = Arc::new(app);

    let req = http::Request::builder()
        .method("POST")
        .body(Full::new(Bytes::from_static(br#"{"x":1,"y":2}"#)))
        .unwrap();
    let resp = Arc::clone(&app).dispatch(req).await;
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(body_of(resp).await, r#"{"x":2,"y":1}"#);

    let req = http::Request::builder()
        .method("POST")
        .body(Full::new(Bytes::from_static(b"not json")))
        .unwrap();
    assert_eq!(app.dispatch(req).await.status(), StatusCode::BAD_REQUEST);
}
