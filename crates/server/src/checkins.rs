use api_types::checkin::{
    CheckinFields, CheckinKind, CheckinNew, CheckinView, CommentNew, CommentView, CurrentCheckins,
    CurrentCheckinsQuery, NextCheckinView, StartupCheckinsQuery,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use engine::{Checkin, CheckinClock, User};

use crate::{ServerError, page::Page, server::ServerState};

fn engine_fields(fields: CheckinFields) -> engine::CheckinFields {
    engine::CheckinFields {
        start_focus: fields.start_focus,
        start_why: fields.start_why,
        start_video_url: fields.start_video_url,
        end_video_url: fields.end_video_url,
        start_comments: fields.start_comments,
        end_comments: fields.end_comments,
    }
}

pub(crate) fn checkin_view(checkin: Checkin, clock: &CheckinClock) -> CheckinView {
    let time_label = checkin.time_label(clock);
    let submitted = checkin.submitted();
    let completed = checkin.completed();
    let fields = checkin.fields;
    CheckinView {
        id: checkin.id.unwrap_or_default(),
        startup_id: checkin.startup_id,
        user_id: checkin.user_id,
        fields: CheckinFields {
            start_focus: fields.start_focus,
            start_why: fields.start_why,
            start_video_url: fields.start_video_url,
            end_video_url: fields.end_video_url,
            start_comments: fields.start_comments,
            end_comments: fields.end_comments,
        },
        comment_count: checkin.comment_count,
        submitted,
        completed,
        submitted_at: checkin.submitted_at,
        completed_at: checkin.completed_at,
        created_at: checkin.created_at,
        updated_at: checkin.updated_at,
        time_label,
    }
}

fn parse_startup_ids(raw: &str) -> Result<Vec<i64>, ServerError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse()
                .map_err(|_| ServerError::Generic(format!("invalid startup id: {id}")))
        })
        .collect()
}

pub async fn next(State(state): State<ServerState>) -> Page<NextCheckinView> {
    let clock = state.engine.clock();
    let now = Utc::now();
    let next = clock.next_checkin(now);
    Page::Show(NextCheckinView {
        kind: match next.kind {
            engine::CheckinKind::Before => CheckinKind::Before,
            engine::CheckinKind::After => CheckinKind::After,
        },
        at: next.at,
        in_before_window: clock.in_before_window(now),
        in_after_window: clock.in_after_window(now),
        week: clock.week_for_time(now),
    })
}

pub async fn current(
    State(state): State<ServerState>,
    Query(query): Query<CurrentCheckinsQuery>,
) -> Result<Page<CurrentCheckins>, ServerError> {
    let startup_ids = parse_startup_ids(&query.startup_ids)?;
    let current = state
        .engine
        .current_checkins_for_startups(&startup_ids, Utc::now())
        .await?;

    let clock = state.engine.clock();
    Ok(Page::Show(CurrentCheckins {
        checkins: current
            .into_iter()
            .map(|(startup_id, checkin)| (startup_id, checkin_view(checkin, clock)))
            .collect(),
    }))
}

pub async fn create(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<CheckinNew>,
) -> Result<Page<CheckinView>, ServerError> {
    match state
        .engine
        .create_checkin(
            &user,
            payload.startup_id,
            engine_fields(payload.fields),
            Utc::now(),
        )
        .await
    {
        Ok(checkin) => Ok(Page::Created(checkin_view(checkin, state.engine.clock()))),
        Err(err) => Page::form_on_invalid("checkin", err),
    }
}

pub async fn show(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Page<CheckinView>, ServerError> {
    let checkin = state.engine.checkin(&user, id).await?;
    Ok(Page::Show(checkin_view(checkin, state.engine.clock())))
}

pub async fn update(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<CheckinFields>,
) -> Result<Page<CheckinView>, ServerError> {
    match state
        .engine
        .update_checkin(&user, id, engine_fields(payload), Utc::now())
        .await
    {
        Ok(checkin) => Ok(Page::Show(checkin_view(checkin, state.engine.clock()))),
        Err(err) => Page::form_on_invalid("checkin", err),
    }
}

pub async fn comment(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<CommentNew>,
) -> Result<Page<CommentView>, ServerError> {
    match state
        .engine
        .add_comment(&user, id, &payload.content, Utc::now())
        .await
    {
        Ok(comment) => Ok(Page::Created(CommentView {
            id: comment.id,
            checkin_id: comment.checkin_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: comment.created_at,
        })),
        Err(err) => Page::form_on_invalid("comment", err),
    }
}

pub async fn for_startup(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(startup_id): Path<i64>,
    Query(query): Query<StartupCheckinsQuery>,
) -> Result<Page<Vec<CheckinView>>, ServerError> {
    let checkins = state
        .engine
        .checkins_for_startup(&user, startup_id, query.completed)
        .await?;
    let clock = state.engine.clock();
    Ok(Page::Show(
        checkins
            .into_iter()
            .map(|checkin| checkin_view(checkin, clock))
            .collect(),
    ))
}
