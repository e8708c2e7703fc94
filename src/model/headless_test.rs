use super::*;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;

#[test]
fn closed_model_rejects_unknown_joints() {
    let mut model = HeadlessModel::with_joints(["joint_a1", "joint_a2"]);
    assert!(model.set_joint_value("joint_a2", 0.7));
    assert!(!model.set_joint_value("gripper", 0.1));
    assert_eq!(model.joint_value("joint_a2"), Some(0.7));
    assert_eq!(model.joint_names(), vec!["joint_a1".to_owned(), "joint_a2".to_owned()]);
}

#[test]
fn open_model_learns_joints_on_write() {
    let mut model = HeadlessModel::open();
    assert!(model.set_joint_value("anything", 1.5));
    assert_eq!(model.joint_value("anything"), Some(1.5));
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/assets/arm.urdf", get(|| async { "<robot name=\"arm\"/>" }))
        .route("/missing.urdf", get(|| async { (StatusCode::NOT_FOUND, "nope") }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_loader_fetches_description() {
    let base = spawn_server().await;
    let loader = HttpProbeLoader::default();
    let model = loader.load(&format!("{base}/assets/arm.urdf")).await.expect("load");
    assert!(model.joint_names().is_empty());
}

#[tokio::test]
async fn http_loader_reports_http_failures() {
    let base = spawn_server().await;
    let loader = HttpProbeLoader::default();
    let err = loader.load(&format!("{base}/missing.urdf")).await.err().expect("should fail");
    assert!(err.to_string().contains("HTTP 404"));
}
