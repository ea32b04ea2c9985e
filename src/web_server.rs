use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::ServerConfig;
use crate::judge::VerdictAggregator;
use crate::routes::{execute_handler, json_error_handler};

/// Body limit for submissions; test data travels inline
const JSON_PAYLOAD_LIMIT: usize = 64 * 1024 * 1024;

pub fn build_server(
    server_config: &ServerConfig,
    aggregator: VerdictAggregator,
) -> std::io::Result<Server> {
    let aggregator = web::Data::new(aggregator);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(aggregator.clone())
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_PAYLOAD_LIMIT)
                    .error_handler(json_error_handler),
            )
            .wrap(middleware::Logger::default())
            .service(execute_handler)
    })
    .bind(server_config.address())?
    .run();

    Ok(server)
}
