use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

pub mod assignment;
pub mod auth;
pub mod db_handling;
pub mod db_models;
pub mod db_utils;
pub mod email;
pub mod insertable;
pub mod messages;
pub mod stats;

#[get("/health")]
pub async fn healthcheck() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "OK", "message": "Wedding API is running" }))
}

/// Mounts every route; shared between the server binary and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(healthcheck)
        .service(web::scope("/api/auth").service(auth_route::login))
        .service(
            web::scope("/api/guests")
                .service(guests_route::fetch_guests)
                .service(guests_route::get_guest)
                .service(guests_route::create_guest)
                .service(guests_route::update_guest)
                .service(guests_route::patch_guest)
                .service(guests_route::delete_guest),
        )
        .service(
            web::scope("/api/tables")
                .service(tables_route::fetch_tables)
                .service(tables_route::get_table)
                .service(tables_route::create_table)
                .service(tables_route::update_table)
                .service(tables_route::delete_table),
        )
        .service(
            web::scope("/api/settings")
                .service(settings_route::fetch_settings)
                .service(settings_route::update_setting),
        )
        .service(
            web::scope("/api/stats")
                .service(stats_route::overall_stats)
                .service(stats_route::attendance_stats)
                .service(stats_route::transportation_stats)
                .service(stats_route::allergies_stats),
        )
        .service(
            web::scope("/api/test")
                .service(test_route::seed_sample_data)
                .service(test_route::reset_guest_data),
        );
}

// sub-route "/api/auth"
pub mod auth_route {
    use actix_web::web::{Data, Json};
    use actix_web::{post, HttpResponse};
    use serde::Deserialize;
    use serde_json::json;

    use crate::services::auth;
    use crate::services::db_utils::AppState;
    use crate::services::messages::FindUserByUsername;
    use crate::types::ApiError;

    #[derive(Deserialize)]
    pub struct LoginBody {
        pub username: String,
        pub password: String,
    }

    #[post("/login")]
    pub async fn login(
        state: Data<AppState>,
        body: Json<LoginBody>,
    ) -> Result<HttpResponse, ApiError> {
        let user = match state.db.send(FindUserByUsername(body.username.clone())).await {
            Ok(Ok(user)) => Some(user),
            Ok(Err(diesel::result::Error::NotFound)) => None,
            Ok(Err(err)) => return Err(err.into()),
            Err(err) => return Err(err.into()),
        };

        // One failure message for both unknown user and wrong password.
        let user = user
            .filter(|u| auth::verify_password(&body.password, &u.password))
            .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_owned()))?;

        let token = auth::issue_token(&user, &state.config.jwt_secret)
            .map_err(|err| ApiError::Internal(format!("token generation failed: {err}")))?;

        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "token": token,
            "user": { "username": user.username, "role": user.role },
        })))
    }
}

// sub-route "/api/guests"
pub mod guests_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{delete, get, patch, post, put, HttpResponse};
    use serde::Deserialize;
    use serde_json::json;

    use crate::services::auth::AuthedUser;
    use crate::services::db_utils::AppState;
    use crate::services::insertable::GuestPatch;
    use crate::services::messages::{
        CreateGuestParty, DeleteGuest, FetchGuest, FetchGuests, PatchGuest, UpdateGuest,
    };
    use crate::types::ApiError;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GuestListQuery {
        pub attending: Option<bool>,
        pub needs_transport: Option<bool>,
        pub search: Option<String>,
    }

    #[get("")]
    pub async fn fetch_guests(
        state: Data<AppState>,
        query: Query<GuestListQuery>,
    ) -> Result<HttpResponse, ApiError> {
        let query = query.into_inner();
        match state
            .db
            .send(FetchGuests {
                attending: query.attending,
                needs_transport: query.needs_transport,
                search: query.search,
            })
            .await
        {
            Ok(Ok(guests)) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "count": guests.len(),
                "data": guests,
            }))),
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[get("/{id}")]
    pub async fn get_guest(
        state: Data<AppState>,
        path: Path<i64>,
    ) -> Result<HttpResponse, ApiError> {
        match state.db.send(FetchGuest(path.into_inner())).await {
            Ok(Ok(guest)) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": guest }))),
            Ok(Err(diesel::result::Error::NotFound)) => {
                Err(ApiError::NotFound("Guest not found".to_owned()))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateGuestBody {
        pub name: Option<String>,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub attending: Option<bool>,
        pub meal_type: Option<String>,
        pub needs_transport: Option<bool>,
        pub allergies: Option<String>,
        pub notes: Option<String>,
        /// Whole party headcount; companions are created alongside the
        /// primary guest.
        pub group_size: Option<i64>,
    }

    #[post("")]
    pub async fn create_guest(
        state: Data<AppState>,
        _user: AuthedUser,
        body: Json<CreateGuestBody>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();

        let name = body
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::Validation("Name is required".to_owned()))?
            .to_owned();

        let party_size = body.group_size.unwrap_or(1);
        if party_size < 1 {
            return Err(ApiError::Validation(
                "groupSize must be at least 1".to_owned(),
            ));
        }

        let created = match state
            .db
            .send(CreateGuestParty {
                name,
                email: body.email,
                phone: body.phone,
                attending: body.attending.unwrap_or(true),
                meal_type: body.meal_type.unwrap_or_else(|| "normal".to_owned()),
                needs_transport: body.needs_transport.unwrap_or(false),
                allergies: body.allergies,
                notes: body.notes,
                party_size,
            })
            .await
        {
            Ok(Ok(created)) => created,
            Ok(Err(err)) => return Err(err.into()),
            Err(err) => return Err(err.into()),
        };

        // Fire-and-forget: delivery problems never fail the request.
        if let Some(primary) = created.first() {
            let notifier = state.notifier.clone();
            let primary = primary.clone();
            actix_web::rt::spawn(async move {
                notifier.notify_guest_created(primary).await;
            });
        }

        Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": created,
            "message": "Guest created successfully",
        })))
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateGuestBody {
        pub name: Option<String>,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub attending: Option<bool>,
        pub meal_type: Option<String>,
        pub needs_transport: Option<bool>,
        pub allergies: Option<String>,
        pub notes: Option<String>,
        pub table_id: Option<i64>,
    }

    #[put("/{id}")]
    pub async fn update_guest(
        state: Data<AppState>,
        _user: AuthedUser,
        path: Path<i64>,
        body: Json<UpdateGuestBody>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();

        let name = body
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::Validation("Name is required".to_owned()))?
            .to_owned();

        match state
            .db
            .send(UpdateGuest {
                id: path.into_inner(),
                name,
                email: body.email,
                phone: body.phone,
                attending: body.attending,
                meal_type: body.meal_type,
                needs_transport: body.needs_transport,
                allergies: body.allergies,
                notes: body.notes,
                table_id: body.table_id,
            })
            .await
        {
            Ok(Ok(guest)) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": guest,
                "message": "Guest updated successfully",
            }))),
            Ok(Err(diesel::result::Error::NotFound)) => {
                Err(ApiError::NotFound("Guest not found".to_owned()))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[patch("/{id}")]
    pub async fn patch_guest(
        state: Data<AppState>,
        _user: AuthedUser,
        path: Path<i64>,
        body: Json<GuestPatch>,
    ) -> Result<HttpResponse, ApiError> {
        match state
            .db
            .send(PatchGuest {
                id: path.into_inner(),
                patch: body.into_inner(),
            })
            .await
        {
            Ok(Ok(guest)) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": guest }))),
            Ok(Err(diesel::result::Error::NotFound)) => {
                Err(ApiError::NotFound("Guest not found".to_owned()))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[delete("/{id}")]
    pub async fn delete_guest(
        state: Data<AppState>,
        _user: AuthedUser,
        path: Path<i64>,
    ) -> Result<HttpResponse, ApiError> {
        match state.db.send(DeleteGuest(path.into_inner())).await {
            Ok(Ok(result)) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": result,
                "message": "Guest deleted successfully",
            }))),
            Ok(Err(diesel::result::Error::NotFound)) => {
                Err(ApiError::NotFound("Guest not found".to_owned()))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }
}

// sub-route "/api/tables"
pub mod tables_route {
    use actix_web::web::{Data, Json, Path};
    use actix_web::{delete, get, patch, post, HttpResponse};
    use serde::Deserialize;
    use serde_json::json;

    use crate::services::auth::AuthedUser;
    use crate::services::db_models::TableShape;
    use crate::services::db_utils::AppState;
    use crate::services::insertable::TableChangeset;
    use crate::services::messages::{
        CreateTable, DeleteTable, FetchTable, FetchTables, UpdateTable,
    };
    use crate::types::ApiError;

    #[get("")]
    pub async fn fetch_tables(
        state: Data<AppState>,
        _user: AuthedUser,
    ) -> Result<HttpResponse, ApiError> {
        match state.db.send(FetchTables).await {
            Ok(Ok(tables)) => {
                Ok(HttpResponse::Ok().json(json!({ "success": true, "data": tables })))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[get("/{id}")]
    pub async fn get_table(
        state: Data<AppState>,
        _user: AuthedUser,
        path: Path<i64>,
    ) -> Result<HttpResponse, ApiError> {
        match state.db.send(FetchTable(path.into_inner())).await {
            Ok(Ok(table)) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": table }))),
            Ok(Err(diesel::result::Error::NotFound)) => {
                Err(ApiError::NotFound("Table not found".to_owned()))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateTableBody {
        pub name: Option<String>,
        pub capacity: Option<i32>,
        pub shape: Option<TableShape>,
    }

    #[post("")]
    pub async fn create_table(
        state: Data<AppState>,
        _user: AuthedUser,
        body: Json<CreateTableBody>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();

        // A blank name means "pick the next auto-generated one".
        let name = body
            .name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());

        match state
            .db
            .send(CreateTable {
                name,
                capacity: body.capacity,
                shape: body.shape,
            })
            .await
        {
            Ok(Ok(table)) => {
                let message = format!("Table created as {}", table.name);
                Ok(HttpResponse::Created().json(json!({
                    "success": true,
                    "data": table,
                    "message": message,
                })))
            }
            Ok(Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ))) => Err(ApiError::Conflict(
                "A table with this name already exists.".to_owned(),
            )),
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[patch("/{id}")]
    pub async fn update_table(
        state: Data<AppState>,
        _user: AuthedUser,
        path: Path<i64>,
        body: Json<TableChangeset>,
    ) -> Result<HttpResponse, ApiError> {
        let id = path.into_inner();
        match state
            .db
            .send(UpdateTable {
                id,
                changes: body.into_inner(),
            })
            .await
        {
            Ok(Ok(0)) => Err(ApiError::NotFound("Table not found".to_owned())),
            Ok(Ok(rows)) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": { "id": id, "rowsAffected": rows },
            }))),
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[delete("/{id}")]
    pub async fn delete_table(
        state: Data<AppState>,
        _user: AuthedUser,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        match state.db.send(DeleteTable(path.into_inner())).await {
            Ok(Ok(removal)) => {
                let message = format!("Table \"{}\" deleted.", removal.name);
                Ok(HttpResponse::Ok().json(json!({
                    "success": true,
                    "data": removal,
                    "message": message,
                })))
            }
            Ok(Err(diesel::result::Error::NotFound)) => {
                Err(ApiError::NotFound("Table not found".to_owned()))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }
}

// sub-route "/api/settings"
pub mod settings_route {
    use actix_web::web::{Data, Json, Path};
    use actix_web::{get, put, HttpResponse};
    use serde::Deserialize;
    use serde_json::json;

    use crate::services::auth::AuthedUser;
    use crate::services::db_utils::AppState;
    use crate::services::messages::{FetchSettings, UpdateSetting};
    use crate::types::ApiError;

    #[get("")]
    pub async fn fetch_settings(
        state: Data<AppState>,
        _user: AuthedUser,
    ) -> Result<HttpResponse, ApiError> {
        match state.db.send(FetchSettings).await {
            Ok(Ok(settings)) => {
                Ok(HttpResponse::Ok().json(json!({ "success": true, "data": settings })))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[derive(Deserialize)]
    pub struct UpdateSettingBody {
        pub value: Option<serde_json::Value>,
    }

    #[put("/{key}")]
    pub async fn update_setting(
        state: Data<AppState>,
        _user: AuthedUser,
        path: Path<String>,
        body: Json<UpdateSettingBody>,
    ) -> Result<HttpResponse, ApiError> {
        let key = path.into_inner();
        let value = match body.into_inner().value {
            Some(serde_json::Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => return Err(ApiError::Validation("Value is required".to_owned())),
        };

        match state.db.send(UpdateSetting { key: key.clone(), value }).await {
            Ok(Ok(result)) => {
                let message = format!("Setting {key} updated successfully");
                Ok(HttpResponse::Ok().json(json!({
                    "success": true,
                    "data": result,
                    "message": message,
                })))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }
}

// sub-route "/api/stats"
pub mod stats_route {
    use actix_web::web::Data;
    use actix_web::{get, HttpResponse};
    use serde_json::json;

    use crate::services::db_utils::AppState;
    use crate::services::messages::FetchGuests;
    use crate::services::stats;
    use crate::types::ApiError;

    async fn load_guests(
        state: &Data<AppState>,
    ) -> Result<Vec<crate::services::db_models::Guest>, ApiError> {
        match state.db.send(FetchGuests::default()).await {
            Ok(Ok(guests)) => Ok(guests),
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[get("")]
    pub async fn overall_stats(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
        let guests = load_guests(&state).await?;
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats::overall(&guests),
        })))
    }

    #[get("/attendance")]
    pub async fn attendance_stats(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
        let guests = load_guests(&state).await?;
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats::by_attendance(&guests),
        })))
    }

    #[get("/transportation")]
    pub async fn transportation_stats(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
        let guests = load_guests(&state).await?;
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats::by_transport(&guests),
        })))
    }

    #[get("/allergies")]
    pub async fn allergies_stats(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
        let guests = load_guests(&state).await?;
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats::by_allergy(&guests),
        })))
    }
}

// sub-route "/api/test"
pub mod test_route {
    use actix_web::web::Data;
    use actix_web::{post, HttpResponse};
    use serde_json::json;

    use crate::services::db_utils::AppState;
    use crate::services::messages::{ResetGuestData, SeedSampleGuests};
    use crate::types::ApiError;

    fn ensure_dev(state: &Data<AppState>) -> Result<(), ApiError> {
        if state.config.is_dev() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "This endpoint is only available in development mode".to_owned(),
            ))
        }
    }

    #[post("/seed")]
    pub async fn seed_sample_data(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
        ensure_dev(&state)?;

        match state.db.send(SeedSampleGuests).await {
            Ok(Ok(count)) => {
                let message = format!("{count} sample guests loaded");
                Ok(HttpResponse::Ok().json(json!({ "success": true, "message": message })))
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }

    #[post("/reset")]
    pub async fn reset_guest_data(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
        ensure_dev(&state)?;

        match state.db.send(ResetGuestData).await {
            Ok(Ok(outcome)) => Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": outcome,
                "message": "Guest data cleared",
            }))),
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err.into()),
        }
    }
}
