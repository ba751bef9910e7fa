//! Handler outcomes.
//!
//! A handler either shows data, redirects (optionally with a flash message)
//! or sends a form back with its field errors.

use api_types::{Flash, FormErrors, RedirectBody};
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use engine::{EngineError, FieldErrors};
use serde::Serialize;

use crate::ServerError;

pub enum Page<T> {
    Show(T),
    Created(T),
    Redirect {
        location: String,
        flash: Option<Flash>,
    },
    Form {
        form: &'static str,
        errors: FieldErrors,
    },
}

impl<T> Page<T> {
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            flash: None,
        }
    }

    pub fn redirect_with(location: impl Into<String>, flash: Flash) -> Self {
        Self::Redirect {
            location: location.into(),
            flash: Some(flash),
        }
    }

    /// Turn a validation failure into the `form` page; any other error is
    /// passed on.
    pub fn form_on_invalid(form: &'static str, err: EngineError) -> Result<Self, ServerError> {
        match err {
            EngineError::Validation(errors) => Ok(Self::Form { form, errors }),
            other => Err(other.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        match self {
            Page::Show(body) => Json(body).into_response(),
            Page::Created(body) => (StatusCode::CREATED, Json(body)).into_response(),
            Page::Redirect { location, flash } => (
                StatusCode::SEE_OTHER,
                [(header::LOCATION, location.clone())],
                Json(RedirectBody { location, flash }),
            )
                .into_response(),
            Page::Form { form, errors } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(FormErrors {
                    form: form.to_string(),
                    errors: errors.into_map(),
                }),
            )
                .into_response(),
        }
    }
}
