use std::convert::Infallible;

use msgs::dto::{HistoryQuery, LimitQuery, PlacePixel, PixelQuery, SetArea, SetCooldown, UserQuery};
use warp::http::StatusCode;
use warp::{reject::Rejection, Filter, Reply};

use context::{with_context, AppContextRef};

pub mod context;
pub mod handler;
pub mod ws;

pub type Result<T> = std::result::Result<T, Rejection>;

#[derive(Debug)]
struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// The whole route tree: public board/ws routes plus the api-key guarded
/// admin surface.
pub fn routes(
    context: AppContextRef,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and_then(handler::health_handler);

    let subscribe = warp::path!("ws")
        .and(warp::ws())
        .and(with_context(context.clone()))
        .and_then(handler::ws_handler);

    let full_board = warp::path!("board")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::full_board_handler);

    let cell = warp::path!("board" / "pixel")
        .and(warp::get())
        .and(warp::query::<PixelQuery>())
        .and(with_context(context.clone()))
        .and_then(handler::cell_handler);

    let place = warp::path!("board" / "pixel")
        .and(warp::post())
        .and(warp::body::json::<PlacePixel>())
        .and(warp::header::<String>("x-user-id"))
        .and(with_context(context.clone()))
        .and_then(handler::place_handler);

    let admin = warp::path("admin")
        .and(admin_guard(context.clone()))
        .and(admin_routes(context));

    health
        .or(subscribe)
        .or(full_board)
        .or(cell)
        .or(place)
        .or(admin)
        .with(warp::cors().allow_any_origin())
        .recover(handle_rejection)
}

fn admin_routes(
    context: AppContextRef,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    let board = warp::path!("board")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::admin_board_handler);

    let board_by_id = warp::path!("board" / String)
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::admin_board_by_id_handler);

    let snapshot_ids = warp::path!("snapshot-ids")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::snapshot_ids_handler);

    let snapshot_count = warp::path!("snapshot-count")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::snapshot_count_handler);

    let history = warp::path!("pixel-history")
        .and(warp::get())
        .and(warp::query::<HistoryQuery>())
        .and(with_context(context.clone()))
        .and_then(handler::history_handler);

    let history_length = warp::path!("pixel-history-length")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::history_length_handler);

    let history_all = warp::path!("pixel-history-all")
        .and(warp::get())
        .and(warp::query::<LimitQuery>())
        .and(with_context(context.clone()))
        .and_then(handler::history_all_handler);

    let history_user = warp::path!("pixel-history-user")
        .and(warp::get())
        .and(warp::query::<UserQuery>())
        .and(with_context(context.clone()))
        .and_then(handler::history_user_handler);

    let user_count = warp::path!("user-count")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::user_count_handler);

    let board_size = warp::path!("board-size")
        .and(warp::get())
        .and(with_context(context.clone()))
        .and_then(handler::board_size_handler);

    let initialize = warp::path!("initialize")
        .and(warp::post())
        .and(with_context(context.clone()))
        .and_then(handler::initialize_handler);

    let reset = warp::path!("reset")
        .and(warp::post())
        .and(with_context(context.clone()))
        .and_then(handler::reset_handler);

    let random = warp::path!("random")
        .and(warp::post())
        .and(with_context(context.clone()))
        .and_then(handler::random_handler);

    let set_area = warp::path!("set-area")
        .and(warp::post())
        .and(warp::body::json::<SetArea>())
        .and(with_context(context.clone()))
        .and_then(handler::set_area_handler);

    let rollback = warp::path!("rollback" / String)
        .and(warp::post())
        .and(with_context(context.clone()))
        .and_then(handler::rollback_handler);

    let cooldown = warp::path!("cooldown")
        .and(warp::post())
        .and(warp::body::json::<SetCooldown>())
        .and(with_context(context))
        .and_then(handler::cooldown_handler);

    board
        .or(board_by_id)
        .unify()
        .or(snapshot_ids)
        .unify()
        .or(snapshot_count)
        .unify()
        .or(history)
        .unify()
        .or(history_length)
        .unify()
        .or(history_all)
        .unify()
        .or(history_user)
        .unify()
        .or(user_count)
        .unify()
        .or(board_size)
        .unify()
        .or(initialize)
        .unify()
        .or(reset)
        .unify()
        .or(random)
        .unify()
        .or(set_area)
        .unify()
        .or(rollback)
        .unify()
        .or(cooldown)
        .unify()
}

/// Admin routes require the shared api key in `x-api-key`.
fn admin_guard(context: AppContextRef) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-api-key")
        .and_then(move |key: Option<String>| {
            let authorized = key.as_deref() == Some(context.admin_key.as_str());
            async move {
                if authorized {
                    Ok(())
                } else {
                    Err(warp::reject::custom(Unauthorized))
                }
            }
        })
        .untuple_one()
}

async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if err.find::<Unauthorized>().is_some() {
        (StatusCode::UNAUTHORIZED, "invalid api key".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::MissingHeader>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        tracing::error!("unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    ))
}
