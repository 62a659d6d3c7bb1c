use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use fushub_api::storage::{MAX_UPLOAD_SIZE, Storage};
use fushub_api::{AppState, AppStateInner};
use fushub_db::Database;
use fushub_realtime::Dispatcher;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    router: Router,
    dir: std::path::PathBuf,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

async fn setup() -> Harness {
    let dir = std::env::temp_dir().join(format!("fushub-api-{}", uuid::Uuid::new_v4()));
    let storage = Storage::new(dir.clone(), "http://localhost:3000")
        .await
        .unwrap();
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret-for-api-flow".into(),
        dispatcher: Dispatcher::new(),
        storage,
        shutdown: CancellationToken::new(),
    });
    Harness {
        router: fushub_api::router(state.clone())
            .route("/realtime", get(fushub_api::realtime::upgrade))
            .with_state(state),
        dir,
    }
}

impl Harness {
    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn signup(&self, email: &str, name: &str, role: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse battery",
                    "full_name": name,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn signin(&self, email: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/signin",
                None,
                Some(json!({ "email": email, "password": "correct horse battery" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Serve the router on a real port for WebSocket clients.
    async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn create_listing(&self, token: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/listings",
            Some(token),
            Some(json!({
                "title": "Kitnet next to Unicamp",
                "listing_type": "kitnet",
                "price_cents": 120000,
                "bedrooms": 1,
                "bathrooms": 1,
                "max_occupants": 2,
                "available_spots": 1,
                "address": "Rua Roxo Moreira, 500",
                "neighborhood": "Barão Geraldo",
                "city": "Campinas",
                "state": "sp",
                "description": "Quiet furnished kitnet, ten minutes walking to campus.",
                "amenities": ["wifi", "furnished"],
                "images": ["http://localhost:3000/public/listing-images/x/cover.jpg"],
            })),
        )
        .await
    }
}

#[tokio::test]
async fn auth_gate_and_signout() {
    let h = setup().await;

    let (status, _) = h.call(Method::GET, "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = h.call(Method::GET, "/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = h.signup("Ana@Example.com", "Ana Souza", "tenant").await;
    let (status, me) = h.call(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ana@example.com");
    assert_eq!(me["profile"]["role"], "tenant");

    // Same address, different case
    let (status, _) = h
        .call(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({
                "email": "ana@example.COM",
                "password": "another password",
                "full_name": "Ana Again",
                "role": "owner",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for email in ["a@@b.c", "a@b..c", "a@b@c.d", "a\"@x.y"] {
        let (status, body) = h
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse battery",
                    "full_name": "Bad Address",
                    "role": "tenant",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{email}");
        assert_eq!(body["error"], "validation_error");
    }

    let (status, _) = h
        .call(
            Method::PUT,
            "/me/profile",
            Some(&token),
            Some(json!({ "full_name": "Ana Souza", "avatar_url": "javascript:alert(1)" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h
        .call(
            Method::POST,
            "/auth/signin",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h.call(Method::POST, "/auth/signout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = h.call(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn listing_browse_and_favorites() {
    let h = setup().await;
    let owner = h.signup("owner@example.com", "Olivia Owner", "owner").await;
    let tenant = h.signup("tenant@example.com", "Tomas Tenant", "tenant").await;

    let (status, _) = h.create_listing(&tenant).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listing) = h.create_listing(&owner).await;
    assert_eq!(status, StatusCode::CREATED, "{listing}");
    assert_eq!(listing["state"], "SP");
    let listing_id = listing["id"].as_str().unwrap().to_string();

    let (_, found) = h.call(Method::GET, "/listings?location=campinas&amenities=wifi", None, None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    let (_, found) = h.call(Method::GET, "/listings?max_price=100000", None, None).await;
    assert!(found.as_array().unwrap().is_empty());
    let (status, _) = h.call(Method::GET, "/listings?amenities=sauna", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let favorite = format!("/listings/{}/favorite", listing_id);
    let (status, toggled) = h.call(Method::POST, &favorite, Some(&tenant), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["state"], "added");
    let (_, ids) = h.call(Method::GET, "/me/favorites/ids", Some(&tenant), None).await;
    assert_eq!(ids, json!([listing_id]));
    let (_, toggled) = h.call(Method::POST, &favorite, Some(&tenant), None).await;
    assert_eq!(toggled["state"], "removed");

    let (_, stats) = h.call(Method::GET, "/stats", None, None).await;
    assert_eq!(stats["students"], 1);
    assert_eq!(stats["properties"], 1);
    assert_eq!(stats["cities_label"], "1+");

    // Hidden listings drop out of browse but stay visible to the owner
    let availability = format!("/listings/{}/availability", listing_id);
    let (status, _) = h
        .call(Method::PUT, &availability, Some(&owner), Some(json!({ "available": false })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, found) = h.call(Method::GET, "/listings", None, None).await;
    assert!(found.as_array().unwrap().is_empty());
    let (_, mine) = h.call(Method::GET, "/me/listings", Some(&owner), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn conversation_flow() {
    let h = setup().await;
    let owner = h.signup("owner@example.com", "Olivia Owner", "owner").await;
    let tenant = h.signup("tenant@example.com", "Tomas Tenant", "tenant").await;
    let outsider = h.signup("other@example.com", "Otto Outsider", "tenant").await;

    let (_, listing) = h.create_listing(&owner).await;
    let listing_id = listing["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .call(Method::POST, "/conversations", Some(&owner), Some(json!({ "listing_id": listing_id })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, summary) = h
        .call(
            Method::POST,
            "/conversations",
            Some(&tenant),
            Some(json!({ "listing_id": listing_id, "message": "Is it still available?" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{summary}");
    assert_eq!(summary["counterpart"]["full_name"], "Olivia Owner");
    assert_eq!(summary["last_message"], "Is it still available?");
    let conversation_id = summary["id"].as_str().unwrap().to_string();

    // Contacting again reuses the conversation
    let (status, again) = h
        .call(Method::POST, "/conversations", Some(&tenant), Some(json!({ "listing_id": listing_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], summary["id"]);

    let (_, unread) = h.call(Method::GET, "/messages/unread", Some(&owner), None).await;
    assert_eq!(unread["total"], 1);
    assert_eq!(unread["recent"].as_array().unwrap().len(), 1);

    let path = format!("/conversations/{}", conversation_id);
    let (status, detail) = h.call(Method::GET, &path, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["marked_read"], 1);
    assert_eq!(detail["messages"].as_array().unwrap().len(), 1);
    assert_eq!(detail["messages"][0]["read"], true);

    let (_, unread) = h.call(Method::GET, "/messages/unread", Some(&owner), None).await;
    assert_eq!(unread["total"], 0);

    let messages = format!("/conversations/{}/messages", conversation_id);
    let (status, _) = h
        .call(Method::POST, &messages, Some(&owner), Some(json!({ "body": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, sent) = h
        .call(Method::POST, &messages, Some(&owner), Some(json!({ "body": "Yes, come visit!" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["read"], false);

    let (_, inbox) = h.call(Method::GET, "/conversations", Some(&tenant), None).await;
    assert_eq!(inbox["total_unread"], 1);
    assert_eq!(inbox["conversations"][0]["last_message"], "Yes, come visit!");

    let (status, _) = h.call(Method::GET, &path, Some(&outsider), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h
        .call(Method::POST, &messages, Some(&outsider), Some(json!({ "body": "hi" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploads_are_typed_and_owned() {
    let h = setup().await;
    let owner = h.signup("owner@example.com", "Olivia Owner", "owner").await;
    let other = h.signup("other@example.com", "Otto Other", "owner").await;

    let upload = |token: &str, content_type: &str, body: &'static [u8]| {
        Request::builder()
            .method(Method::POST)
            .uri("/storage/listing-images")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    };

    let (status, _) = h.send(upload(&owner, "text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let (status, _) = h.send(upload(&owner, "image/png", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = Request::builder()
        .method(Method::POST)
        .uri("/storage/avatars")
        .header(header::AUTHORIZATION, format!("Bearer {}", owner))
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from(vec![0u8; MAX_UPLOAD_SIZE + 1]))
        .unwrap();
    let (status, body) = h.send(oversized).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");

    let (status, stored) = h.send(upload(&owner, "image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::CREATED, "{stored}");
    let path = stored["path"].as_str().unwrap().to_string();
    assert!(path.ends_with(".png"));
    assert_eq!(
        stored["public_url"],
        format!("http://localhost:3000/public/listing-images/{}", path)
    );

    let target = format!("/storage/listing-images/{}", path);
    let (status, _) = h.call(Method::DELETE, &target, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h.call(Method::DELETE, &target, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = h.call(Method::DELETE, &target, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn booking_and_review_flow() {
    let h = setup().await;
    let owner = h.signup("owner@example.com", "Olivia Owner", "owner").await;
    let tenant = h.signup("tenant@example.com", "Tomas Tenant", "tenant").await;
    let outsider = h.signup("other@example.com", "Otto Outsider", "tenant").await;

    let (_, listing) = h.create_listing(&owner).await;
    let listing_id = listing["id"].as_str().unwrap().to_string();
    let reviews = format!("/listings/{}/reviews", listing_id);
    let eligibility = format!("/listings/{}/reviews/eligibility", listing_id);
    let review = json!({ "rating": 5, "comment": "Quiet and close to campus." });

    let (status, _) = h.call(Method::GET, "/me/dashboard", Some(&tenant), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // No stay yet
    let (status, _) = h.call(Method::POST, &reviews, Some(&tenant), Some(review.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, eligible) = h.call(Method::GET, &eligibility, Some(&tenant), None).await;
    assert_eq!(eligible["can_review"], false);

    let bookings = format!("/listings/{}/bookings", listing_id);
    let (status, _) = h
        .call(
            Method::POST,
            &bookings,
            Some(&tenant),
            Some(json!({ "move_in": "2026-08-01", "move_out": "2026-07-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, booking) = h
        .call(
            Method::POST,
            &bookings,
            Some(&tenant),
            Some(json!({ "move_in": "2026-08-01", "move_out": "2026-12-15" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["status"], "pending");
    let status_path = format!("/bookings/{}/status", booking["id"].as_str().unwrap());
    let set = |status: &str| Some(json!({ "status": status }));

    let (status, _) = h.call(Method::PUT, &status_path, Some(&tenant), set("confirmed")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h.call(Method::PUT, &status_path, Some(&outsider), set("confirmed")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h.call(Method::PUT, &status_path, Some(&owner), set("completed")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Two confirmations race: one applies, the other sees a stale status
    let (first, second) = tokio::join!(
        h.call(Method::PUT, &status_path, Some(&owner), set("confirmed")),
        h.call(Method::PUT, &status_path, Some(&owner), set("confirmed")),
    );
    let mut outcomes = [first.0, second.0];
    outcomes.sort();
    assert_eq!(outcomes, [StatusCode::OK, StatusCode::CONFLICT]);

    let (status, _) = h.call(Method::POST, &reviews, Some(&tenant), Some(review.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, completed) = h.call(Method::PUT, &status_path, Some(&owner), set("completed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    let (status, _) = h.call(Method::PUT, &status_path, Some(&tenant), set("cancelled")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, eligible) = h.call(Method::GET, &eligibility, Some(&tenant), None).await;
    assert_eq!(eligible["can_review"], true);
    let (status, created) = h.call(Method::POST, &reviews, Some(&tenant), Some(review.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["author_name"], "Tomas Tenant");
    let (status, _) = h.call(Method::POST, &reviews, Some(&tenant), Some(review)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, eligible) = h.call(Method::GET, &eligibility, Some(&tenant), None).await;
    assert_eq!(eligible["can_review"], false);

    let (_, listed) = h.call(Method::GET, &reviews, None, None).await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["average_rating"], 5.0);

    let (_, mine) = h.call(Method::GET, "/me/bookings", Some(&tenant), None).await;
    assert_eq!(mine["as_tenant"].as_array().unwrap().len(), 1);
    let (_, theirs) = h.call(Method::GET, "/me/bookings", Some(&owner), None).await;
    assert_eq!(theirs["as_owner"].as_array().unwrap().len(), 1);

    let (status, dashboard) = h.call(Method::GET, "/me/dashboard", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["active_listings"], 1);
    assert_eq!(dashboard["listings"][0]["review_count"], 1);
    assert_eq!(dashboard["listings"][0]["average_rating"], 5.0);
}

async fn connect(addr: SocketAddr, token: &str) -> Client {
    let (mut ws, _) = connect_async(format!("ws://{}/realtime?token={}", addr, token))
        .await
        .unwrap();
    let ready = next_text(&mut ws).await.unwrap();
    assert_eq!(ready["type"], "Ready");
    ws
}

/// Next text frame within half a second, skipping heartbeats.
async fn next_text(ws: &mut Client) -> Option<Value> {
    loop {
        match tokio::time::timeout(Duration::from_millis(500), ws.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => return serde_json::from_str(text.as_str()).ok(),
            Ok(Some(Ok(WsMessage::Ping(_)))) => continue,
            _ => return None,
        }
    }
}

#[tokio::test]
async fn signout_closes_that_sessions_socket() {
    let h = setup().await;
    let owner = h.signup("owner@example.com", "Olivia Owner", "owner").await;
    let phone = h.signup("ana@example.com", "Ana Souza", "tenant").await;
    let laptop = h.signin("ana@example.com").await;
    let addr = h.serve().await;

    let mut phone_ws = connect(addr, &phone).await;
    let mut laptop_ws = connect(addr, &laptop).await;
    let subscribe = json!({ "type": "Subscribe", "data": { "table": "listings" } }).to_string();
    for ws in [&mut phone_ws, &mut laptop_ws] {
        ws.send(WsMessage::Text(subscribe.clone().into())).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, _) = h.call(Method::POST, "/auth/signout", Some(&phone), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let closed = loop {
        match tokio::time::timeout(Duration::from_secs(2), phone_ws.next()).await {
            Ok(Some(Ok(WsMessage::Ping(_)))) => continue,
            Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => break true,
            _ => break false,
        }
    };
    assert!(closed, "signed-out socket is still open");
    let url = format!("ws://{}/realtime?token={}", addr, phone);
    assert!(connect_async(url).await.is_err());

    // The other session keeps its feed
    let (status, _) = h.create_listing(&owner).await;
    assert_eq!(status, StatusCode::CREATED);
    let event = next_text(&mut laptop_ws).await.unwrap();
    assert_eq!(event["type"], "ListingChanged");
    assert_eq!(event["data"]["change"], "created");
}
