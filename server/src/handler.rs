use bytes::Bytes;
use engine::CanvasError;
use msgs::dto::{HistoryQuery, LimitQuery, PlacePixel, PixelQuery, SetArea, SetCooldown, UserQuery};
use warp::http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::{Reply, ws::Ws};

use crate::context::AppContextRef;
use crate::{ws, Result};

const BOARD_CACHE_CONTROL: &str = "public, max-age=60, s-maxage=60, stale-while-revalidate=5";
const CELL_CACHE_CONTROL: &str = "public, max-age=300, s-maxage=300, stale-while-revalidate=5";

pub async fn health_handler() -> Result<impl Reply> {
    Ok(StatusCode::OK)
}

pub async fn ws_handler(ws: Ws, context: AppContextRef) -> Result<impl Reply> {
    Ok(ws.on_upgrade(move |socket| ws::viewer_connection_process(socket, context)))
}

pub async fn full_board_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    match context.canvas.board_bytes() {
        Ok(bytes) => Ok(board_reply(bytes, Some(BOARD_CACHE_CONTROL))),
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn cell_handler(query: PixelQuery, context: AppContextRef) -> Result<warp::reply::Response> {
    match context.canvas.cell_details(query.x, query.y) {
        Ok(info) => {
            let mut res = warp::reply::json(&info).into_response();
            res.headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static(CELL_CACHE_CONTROL));
            Ok(res)
        }
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn place_handler(
    body: PlacePixel,
    user_id: String,
    context: AppContextRef,
) -> Result<warp::reply::Response> {
    match context
        .canvas
        .place(body.x, body.y, body.color_index, &user_id)
    {
        Ok(_) => {
            let mut res = success_reply();
            res.headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            Ok(res)
        }
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn admin_board_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    match context.canvas.snapshots().latest() {
        Ok(Some((_, bytes))) => Ok(board_reply(bytes, None)),
        Ok(None) => Ok(error_reply(&CanvasError::NotFound(
            "no snapshots yet".to_string(),
        ))),
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn admin_board_by_id_handler(
    id: String,
    context: AppContextRef,
) -> Result<warp::reply::Response> {
    match context.canvas.snapshots().get(&id) {
        Ok(bytes) => Ok(board_reply(bytes, None)),
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn snapshot_ids_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    match context.canvas.snapshots().list() {
        Ok(list) => Ok(warp::reply::json(&list).into_response()),
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn snapshot_count_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    match context.canvas.snapshots().count() {
        Ok(count) => Ok(warp::reply::json(&count).into_response()),
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn history_handler(
    query: HistoryQuery,
    context: AppContextRef,
) -> Result<warp::reply::Response> {
    let page = context.canvas.history().query_by_cell(
        query.x,
        query.y,
        query.limit,
        query.user_id.as_deref(),
        query.cursor.as_deref(),
    );
    Ok(warp::reply::json(&page).into_response())
}

pub async fn history_length_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    Ok(warp::reply::json(&context.canvas.history().count()).into_response())
}

pub async fn history_all_handler(
    query: LimitQuery,
    context: AppContextRef,
) -> Result<warp::reply::Response> {
    Ok(warp::reply::json(&context.canvas.history().query_all(query.limit)).into_response())
}

pub async fn history_user_handler(
    query: UserQuery,
    context: AppContextRef,
) -> Result<warp::reply::Response> {
    Ok(warp::reply::json(&context.canvas.history().query_by_user(&query.user_id)).into_response())
}

pub async fn user_count_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    Ok(warp::reply::json(&context.broadcast.viewer_count()).into_response())
}

pub async fn board_size_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    Ok(warp::reply::json(&context.canvas.board_size()).into_response())
}

pub async fn initialize_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    match context.canvas.initialize() {
        Ok(()) => {
            tracing::info!("board initialized by admin");
            Ok(success_reply())
        }
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn reset_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    context.canvas.reset();
    tracing::info!("board reset by admin");
    Ok(success_reply())
}

pub async fn random_handler(context: AppContextRef) -> Result<warp::reply::Response> {
    context.canvas.randomize();
    tracing::info!("board randomized by admin");
    Ok(success_reply())
}

pub async fn set_area_handler(
    body: SetArea,
    context: AppContextRef,
) -> Result<warp::reply::Response> {
    match context
        .canvas
        .set_area(body.start_x, body.start_y, body.width, body.height, 0)
    {
        Ok(events) => {
            tracing::info!(affected = events.len(), "area cleared by admin");
            Ok(warp::reply::json(&serde_json::json!({
                "status": "success",
                "affected": events.len(),
            }))
            .into_response())
        }
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn rollback_handler(id: String, context: AppContextRef) -> Result<warp::reply::Response> {
    match context.canvas.rollback(&id) {
        Ok(checkpoint) => Ok(warp::reply::json(&serde_json::json!({
            "status": "success",
            "checkpointId": checkpoint.snapshot_id,
        }))
        .into_response()),
        Err(e) => Ok(error_reply(&e)),
    }
}

pub async fn cooldown_handler(
    body: SetCooldown,
    context: AppContextRef,
) -> Result<warp::reply::Response> {
    context.canvas.set_cooldown_ms(body.cooldown_period);
    Ok(warp::reply::json(&serde_json::json!({
        "status": "success",
        "message": format!("Cooldown Period is set to {}", body.cooldown_period),
    }))
    .into_response())
}

fn success_reply() -> warp::reply::Response {
    warp::reply::json(&serde_json::json!({ "status": "success" })).into_response()
}

fn board_reply(bytes: Vec<u8>, cache_control: Option<&'static str>) -> warp::reply::Response {
    let mut res = warp::reply::Response::new(Bytes::from(bytes).into());
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Some(cache_control) = cache_control {
        res.headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
    }
    res
}

fn error_reply(e: &CanvasError) -> warp::reply::Response {
    let status = match e {
        CanvasError::OutOfBounds { .. } | CanvasError::InvalidColor(_) => StatusCode::BAD_REQUEST,
        CanvasError::Forbidden => StatusCode::FORBIDDEN,
        CanvasError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
        CanvasError::NotFound(_) => StatusCode::NOT_FOUND,
        CanvasError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    match e {
        CanvasError::StoreUnavailable(_) => tracing::error!("request failed: {e}"),
        // cooldown rejections are expected traffic
        _ => tracing::debug!("request rejected: {e}"),
    }
    let body = match e {
        CanvasError::CooldownActive { remaining_secs } => serde_json::json!({
            "error": e.to_string(),
            "remainingSeconds": remaining_secs,
        }),
        _ => serde_json::json!({ "error": e.to_string() }),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}
