#![allow(clippy::unwrap_used)]
// Door commands sent through `LiveStateClient`, against a wiremock device.

use std::time::Duration;

use tracing::Span;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ratgdo_core::{DeviceAddress, LiveStateClient, StreamConfig, TargetDoorState};

fn device_address(server: &MockServer) -> DeviceAddress {
    let uri = Url::parse(&server.uri()).unwrap();
    DeviceAddress::new(uri.host_str().unwrap(), uri.port().unwrap())
}

#[tokio::test]
async fn test_request_target_posts_empty_close() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cover/door/close"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        LiveStateClient::spawn(device_address(&server), StreamConfig::default(), &Span::none())
            .unwrap();

    // Returns at once; the request goes out in the background.
    client.request_target(TargetDoorState::Closed);

    let mut command = None;
    for _ in 0..50 {
        let requests = server.received_requests().await.unwrap_or_default();
        command = requests
            .into_iter()
            .find(|r| r.method.as_str() == "POST" && r.url.path() == "/cover/door/close");
        if command.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let command = command.expect("close command never reached the device");
    assert!(command.body.is_empty(), "body was {:?}", command.body);

    client.close();
    client.terminated().await;
}

#[tokio::test]
async fn test_request_target_open_hits_open_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cover/door/open"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        LiveStateClient::spawn(device_address(&server), StreamConfig::default(), &Span::none())
            .unwrap();
    client.request_target(TargetDoorState::Open);

    let mut seen = false;
    for _ in 0..50 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.iter().any(|r| r.url.path() == "/cover/door/open") {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(seen, "open command never reached the device");

    client.close();
    client.terminated().await;
}
