//! A small server showing the registration API: echoing POST bodies, serving a file,
//! and answering JSON.

use embedhttp::{HttpServer, ServerConfig, StatusCode};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct Greeting {
    name: String,
}

#[derive(Serialize)]
struct Reply {
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger
    env_logger::init();

    let mut server = HttpServer::new(ServerConfig::with_port(8080));

    server.register_get("/", |_req, res| {
        res.set_body("Hello, World!");
    });

    // Echo the raw body back.
    server.register_post("/echo", |req, res| {
        res.set_body(req.body.clone());
    });

    // Serve a file from the working directory.
    server.register_get("/index.html", |_req, res| match std::fs::read("index.html") {
        Ok(contents) => {
            res.set_content_type("text/html");
            res.set_body(contents);
        }
        Err(e) => {
            warn!("Cannot read index.html: {e}");
            res.set_status(StatusCode::NotFound);
            res.set_body("index.html not found");
        }
    });

    server.register_post("/greet", |req, res| {
        let reply = match req.json::<Greeting>() {
            Ok(greeting) => Reply {
                message: format!("Hello, {}!", greeting.name),
            },
            Err(e) => {
                res.set_status(StatusCode::BadRequest);
                Reply {
                    message: e.to_string(),
                }
            }
        };
        if let Err(e) = res.set_json(&reply) {
            warn!("Cannot encode reply: {e}");
        }
    });

    info!("Starting server on http://0.0.0.0:8080");

    server.start().await?;

    Ok(())
}
