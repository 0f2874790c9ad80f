use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use client_core::{
    CameraChange, CameraError, CameraSurface, ControlSettings, GestureRuntime, RuntimeHandle,
    SharedCamera, WebSocketSource,
};
use shared::{
    domain::GestureKind,
    protocol::{GestureEvent, InboundEvent},
};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
enum Outbound {
    Text(String),
    Binary,
    Close,
}

/// Stand-in for the gesture producer: forwards whatever the test publishes
/// to every connected client.
#[derive(Clone)]
struct Producer {
    outbound: broadcast::Sender<Outbound>,
    connections: Arc<AtomicUsize>,
}

impl Producer {
    fn publish(&self, frame: Outbound) {
        self.outbound.send(frame).expect("a client is connected");
    }

    fn gesture(&self, event: GestureEvent) {
        let json = InboundEvent::Gesture(event).to_json().expect("encode");
        self.publish(Outbound::Text(json));
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn gestures_ws(ws: WebSocketUpgrade, State(producer): State<Producer>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_gestures(producer, socket))
}

async fn stream_gestures(producer: Producer, mut socket: WebSocket) {
    let mut outbound = producer.outbound.subscribe();
    producer.connections.fetch_add(1, Ordering::SeqCst);

    while let Ok(frame) = outbound.recv().await {
        let message = match frame {
            Outbound::Text(text) => Message::Text(text),
            Outbound::Binary => Message::Binary(vec![0x01, 0x02]),
            Outbound::Close => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        };
        if socket.send(message).await.is_err() {
            break;
        }
    }
}

async fn start_producer() -> (Producer, SocketAddr) {
    let (outbound, _) = broadcast::channel(64);
    let producer = Producer {
        outbound,
        connections: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new()
        .route("/gestures", get(gestures_ws))
        .with_state(producer.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (producer, addr)
}

#[derive(Default)]
struct MapCamera {
    zoom: f64,
    eases: Vec<CameraChange>,
    pans: Vec<[f64; 2]>,
}

impl CameraSurface for MapCamera {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn ease_to(&mut self, change: CameraChange, _duration: Duration) -> Result<(), CameraError> {
        if let CameraChange::Zoom(zoom) = change {
            self.zoom = zoom;
        }
        self.eases.push(change);
        Ok(())
    }

    fn pan_by(&mut self, offset: [f64; 2], _duration: Duration) -> Result<(), CameraError> {
        self.pans.push(offset);
        Ok(())
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn connected_runtime(
    addr: SocketAddr,
    producer: &Producer,
    camera: &Arc<Mutex<MapCamera>>,
) -> RuntimeHandle {
    let settings = ControlSettings {
        ws_url: format!("ws://{addr}/gestures"),
        reconnect_delay: Duration::from_millis(100),
        ..ControlSettings::default()
    };
    let (runtime, handle) = GestureRuntime::new(settings, WebSocketSource);
    let shared: SharedCamera = camera.clone();
    handle.attach_camera(&shared);
    tokio::spawn(runtime.run());

    handle.connect().expect("connect");
    eventually("connection", || {
        producer.connections() == 1 && handle.status().connected
    })
    .await;
    handle
}

#[tokio::test]
async fn gestures_over_websocket_move_the_camera() {
    let (producer, addr) = start_producer().await;
    let camera = Arc::new(Mutex::new(MapCamera {
        zoom: 10.0,
        ..MapCamera::default()
    }));
    let handle = connected_runtime(addr, &producer, &camera).await;

    producer.publish(Outbound::Binary);
    producer.publish(Outbound::Text("{not json".to_string()));
    producer.gesture(GestureEvent::new(GestureKind::ZoomIn).with_intensity(0.5));
    eventually("zoom", || !camera.lock().expect("camera").eases.is_empty()).await;
    assert!((camera.lock().expect("camera").zoom - 10.45).abs() < 1e-9);

    producer.gesture(GestureEvent::new(GestureKind::PanRight).with_velocity(0.2));
    eventually("pan steps", || camera.lock().expect("camera").pans.len() >= 3).await;
    producer.gesture(GestureEvent::new(GestureKind::Idle));
    eventually("idle", || handle.status().active_gesture == "idle").await;

    let steps = camera.lock().expect("camera").pans.clone();
    assert!(steps.iter().all(|offset| (offset[0] - 30.0).abs() < 1e-9));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(camera.lock().expect("camera").pans.len(), steps.len());

    handle.destroy().expect("destroy");
    eventually("shutdown", || !handle.is_running()).await;
    assert!(!handle.status().connected);
}

#[tokio::test]
async fn producer_restart_is_followed_by_reconnect() {
    let (producer, addr) = start_producer().await;
    let camera = Arc::new(Mutex::new(MapCamera {
        zoom: 5.0,
        ..MapCamera::default()
    }));
    let handle = connected_runtime(addr, &producer, &camera).await;

    producer.publish(Outbound::Close);
    eventually("reconnect", || {
        producer.connections() == 2 && handle.status().connected
    })
    .await;

    producer.gesture(GestureEvent::new(GestureKind::ZoomOut));
    eventually("zoom after reconnect", || {
        !camera.lock().expect("camera").eases.is_empty()
    })
    .await;

    handle.destroy().expect("destroy");
}
