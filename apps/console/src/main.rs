use std::io::{self, Write as _};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{
    logout, resolve, Column, ConfirmationFlow, EditForm, EditOutcome, FileSessionStore,
    HttpUserApi, OperationCoordinator, RecordStore, Route, RouteDecision, SessionStore,
    TableModel, UserDraft,
};
use shared::domain::UserId;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "console", about = "Administrative console for user accounts")]
struct Cli {
    /// Override the configured API base URL.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a session token and sign in.
    Login { token: String },
    /// Erase the session token.
    Logout,
    /// List user accounts.
    List {
        /// Sort column: id, name or email.
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        descending: bool,
        /// Substring filter on the name column.
        #[arg(long)]
        name: Option<String>,
        /// Substring filter on the email column.
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
        /// Columns to hide from the output.
        #[arg(long)]
        hide: Vec<String>,
    },
    /// Create a user account.
    Create {
        name: String,
        email: String,
        password: String,
        confirm_password: String,
    },
    /// Edit a user account.
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        current_password: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Delete one user account, after confirmation.
    Delete {
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Delete several user accounts, after confirmation.
    BulkDelete {
        ids: Vec<i64>,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn parse_column(raw: &str) -> Result<Column> {
    match raw.to_ascii_lowercase().as_str() {
        "id" => Ok(Column::Id),
        "name" => Ok(Column::Name),
        "email" => Ok(Column::Email),
        other => Err(anyhow!("unknown column: {other}")),
    }
}

fn prompt_yes(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

/// Guard the protected users view, then fetch the record set. `None`
/// means the guard redirected and nothing further should run.
async fn open_users_view(
    settings: &Settings,
    session: &FileSessionStore,
) -> Result<Option<(OperationCoordinator<HttpUserApi>, RecordStore)>> {
    if let RouteDecision::Redirect(route) = resolve(Route::Users, session) {
        println!("no session; redirected to {}", route.path());
        return Ok(None);
    }
    let api = HttpUserApi::new(&settings.api_url)?;
    let mut coordinator = OperationCoordinator::new(api);
    let mut store = RecordStore::new();
    coordinator.load_all(&mut store).await?;
    Ok(Some((coordinator, store)))
}

fn print_table(model: &mut TableModel, store: &RecordStore) {
    let columns = model.visible_columns();
    let projection = model.projection(store);
    println!(
        "{}",
        columns
            .iter()
            .map(|column| column.label())
            .collect::<Vec<_>>()
            .join("\t")
    );
    for row in &projection.rows {
        println!(
            "{}",
            columns
                .iter()
                .map(|column| column.value_of(row))
                .collect::<Vec<_>>()
                .join("\t")
        );
    }
    println!(
        "page {} of {} ({} matching)",
        projection.page_index + 1,
        projection.page_count.max(1),
        projection.total_matching
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    tracing::debug!(api_url = %settings.api_url, "configuration loaded");
    let mut session = FileSessionStore::new(&settings.session_dir);

    match cli.command {
        Command::Login { token } => {
            if let RouteDecision::Redirect(route) = resolve(Route::SignIn, &session) {
                println!("already signed in; continue at {}", route.path());
                return Ok(());
            }
            session.set_token(&token)?;
            println!("signed in; continue at {}", Route::Dashboard.path());
        }
        Command::Logout => {
            let landing = logout(&mut session)?;
            println!("signed out; continue at {}", landing.path());
        }
        Command::List {
            sort,
            descending,
            name,
            email,
            page,
            page_size,
            hide,
        } => {
            let Some((_coordinator, store)) = open_users_view(&settings, &session).await? else {
                return Ok(());
            };
            let mut model = TableModel::with_page_size(page_size);
            if let Some(raw) = sort {
                let column = parse_column(&raw)?;
                model.toggle_sort(column);
                if descending {
                    model.toggle_sort(column);
                }
            }
            if let Some(pattern) = name {
                model.set_filter(Column::Name, &pattern);
            }
            if let Some(pattern) = email {
                model.set_filter(Column::Email, &pattern);
            }
            for raw in hide {
                model.toggle_column(parse_column(&raw)?);
            }
            model.set_page(page);
            print_table(&mut model, &store);
        }
        Command::Create {
            name,
            email,
            password,
            confirm_password,
        } => {
            let Some((mut coordinator, mut store)) = open_users_view(&settings, &session).await?
            else {
                return Ok(());
            };
            let draft = UserDraft {
                name,
                email,
                password,
                confirm_password,
            };
            let record = coordinator.create(&mut store, &draft).await?;
            println!("created user {} ({})", record.id.0, record.email);
        }
        Command::Edit {
            id,
            name,
            email,
            current_password,
            new_password,
            confirm_password,
        } => {
            let Some((mut coordinator, mut store)) = open_users_view(&settings, &session).await?
            else {
                return Ok(());
            };
            let id = UserId(id);
            let current = store
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow!("user {} not found", id.0))?;
            let mut form = EditForm::for_record(&current);
            if let Some(v) = name {
                form.name = v;
            }
            if let Some(v) = email {
                form.email = v;
            }
            if let Some(v) = current_password {
                form.current_password = v;
            }
            if let Some(v) = new_password {
                form.new_password = v;
            }
            if let Some(v) = confirm_password {
                form.confirm_password = v;
            }
            match coordinator.edit(&mut store, id, &form).await? {
                EditOutcome::Updated(record) => println!("updated user {}", record.id.0),
                EditOutcome::NoChanges => println!("nothing to update"),
            }
        }
        Command::Delete { id, yes } => {
            let Some((mut coordinator, mut store)) = open_users_view(&settings, &session).await?
            else {
                return Ok(());
            };
            let id = UserId(id);
            let record = store
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow!("user {} not found", id.0))?;

            let mut flow = ConfirmationFlow::new();
            flow.open_single(record.clone());
            let confirmed = yes
                || prompt_yes(&format!(
                    "Delete user \"{}\" (id {})? This cannot be undone.",
                    record.name, id.0
                ))?;
            if !confirmed {
                flow.cancel();
                println!("cancelled");
                return Ok(());
            }
            if flow.confirm().is_some() {
                let result = coordinator.delete_one(&mut store, id).await;
                flow.finish();
                result?;
                println!("deleted user {}", id.0);
            }
        }
        Command::BulkDelete { ids, yes } => {
            let Some((mut coordinator, mut store)) = open_users_view(&settings, &session).await?
            else {
                return Ok(());
            };
            let mut model = TableModel::new();
            for raw in ids {
                let id = UserId(raw);
                if !store.contains(id) {
                    return Err(anyhow!("user {raw} not found"));
                }
                model.toggle_select(id);
            }
            let snapshot = model.selected_records(&store);

            let mut flow = ConfirmationFlow::new();
            if !flow.open_bulk(snapshot) {
                println!("nothing selected");
                return Ok(());
            }
            let count = flow.target().map(|target| target.count()).unwrap_or(0);
            let confirmed = yes
                || prompt_yes(&format!(
                    "Delete {count} selected users? This cannot be undone."
                ))?;
            if !confirmed {
                flow.cancel();
                println!("cancelled");
                return Ok(());
            }
            if let Some(target) = flow.confirm() {
                let target_ids = target.ids();
                let result = coordinator
                    .delete_many(&mut store, model.selection_mut(), &target_ids)
                    .await;
                flow.finish();
                result?;
                println!("deleted {} users", target_ids.len());
            }
        }
    }

    Ok(())
}
