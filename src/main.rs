use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;

use tool_directory::api::{self, AppState};
use tool_directory::auth::AuthService;
use tool_directory::config::{AdminBootstrap, Config};
use tool_directory::error::DirectoryResult;
use tool_directory::store::Store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // Initialize store
    let store = Arc::new(Store::new(&config.database_path).map_err(|e| {
        log::error!("Failed to initialize database {}: {}", config.database_path, e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?);
    log::info!("Database: {}", config.database_path);

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(config.jwt_secret.clone()));

    // Auto-create admin user from environment variables if no users exist
    if let Some(ref admin) = config.admin {
        if let Err(e) = bootstrap_admin(&store, &auth_service, admin) {
            log::error!("Failed to create admin user '{}': {}", admin.username, e);
        }
    }

    let import_policy = config.import_policy;
    log::info!(
        "Starting tool directory on {}:{} (unknown import categories: {:?})",
        config.bind_addr,
        config.port,
        import_policy
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            // Register Store and AuthService individually for the Viewer extractor
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
                import_policy,
            }))
            // Import files can be large
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
            .configure(api::configure_routes)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

/// Create the configured admin (also a moderator) when the user table is empty.
fn bootstrap_admin(store: &Store, auth_service: &AuthService, admin: &AdminBootstrap) -> DirectoryResult<()> {
    if store.count_users()? > 0 {
        return Ok(());
    }

    log::info!("Creating admin user from environment: {}", admin.username);
    auth_service.create_account(store, &admin.username, &admin.email, &admin.password, true, true)?;
    log::info!("Admin user created successfully");
    Ok(())
}
