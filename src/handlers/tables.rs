use axum::{
    Form, Json,
    extract::State,
    response::Redirect,
};
use serde::Deserialize;
use tracing::info;

use crate::db::{catalog, reader, schema};
use crate::error::{ConsoleError, HOME_PATH};
use crate::middleware::session::RequireSession;
use crate::router::ConsoleState;
use crate::service::{form_payload, update};
use crate::types::views::{HomeView, TableView, TablesView};

#[derive(Debug, Deserialize)]
pub struct ModuleForm {
    pub module: String,
}

#[derive(Debug, Deserialize)]
pub struct TableForm {
    pub table: String,
}

/// GET /home -> registered modules.
pub async fn home(
    State(state): State<ConsoleState>,
    RequireSession(session): RequireSession,
) -> Result<Json<HomeView>, ConsoleError> {
    let mut conn = state.provider.acquire_for(&session.credential).await?;
    let modules = catalog::list_modules(&mut conn).await?;
    state.provider.release(conn);
    Ok(Json(HomeView { modules }))
}

/// POST /tables -> tables registered for one module.
pub async fn tables(
    State(state): State<ConsoleState>,
    RequireSession(session): RequireSession,
    Form(form): Form<ModuleForm>,
) -> Result<Json<TablesView>, ConsoleError> {
    let mut conn = state.provider.acquire_for(&session.credential).await?;
    let tables = catalog::list_tables(&mut conn, &form.module).await?;
    state.provider.release(conn);
    Ok(Json(TablesView {
        module: form.module,
        tables,
    }))
}

/// POST /view-table -> every row of a registered table.
pub async fn view_table(
    State(state): State<ConsoleState>,
    RequireSession(session): RequireSession,
    Form(form): Form<TableForm>,
) -> Result<Json<TableView>, ConsoleError> {
    let mut conn = state.provider.acquire_for(&session.credential).await?;
    let table = catalog::allow_table(&mut conn, &form.table).await?;
    let snapshot = reader::read_table(&mut conn, state.provider.dialect(), &table).await?;
    state.provider.release(conn);
    Ok(Json(snapshot.into()))
}

/// POST /update-table -> applies a bulk edit posted as `table` plus
/// `data[<row>][<COLUMN>]` fields, then returns to the landing page.
pub async fn update_table(
    State(state): State<ConsoleState>,
    RequireSession(session): RequireSession,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Redirect, ConsoleError> {
    let (requested, cells) = form_payload::take_table_field(fields);
    let requested = requested.unwrap_or_default();
    let dialect = state.provider.dialect();

    let mut conn = state.provider.acquire_for(&session.credential).await?;
    let table = catalog::allow_table(&mut conn, &requested).await?;
    let schema = schema::describe_table(&mut conn, dialect, &table).await?;
    let grid = form_payload::parse(cells);
    let updated = update::apply(
        &mut conn,
        dialect,
        &schema,
        &grid,
        &state.settings.identifying_column,
    )
    .await?;
    state.provider.release(conn);

    info!(table = %table, rows = grid.row_count(), updated, "bulk edit applied");
    Ok(Redirect::to(HOME_PATH))
}
