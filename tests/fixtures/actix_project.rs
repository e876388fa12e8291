// Actix-Web test fixture - a post API using route macros and scopes
use actix_web::{delete, get, middleware::Logger, post, put, web, App, HttpResponse, HttpServer};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub body: String,
}

impl CreatePost {
    pub fn rules() -> Vec<(&'static str, &'static str)> {
        vec![
            ("title", "required|string"),
            ("body", "required"),
        ]
    }
}

/// List posts.
#[get("/posts")]
async fn list_posts() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Create a post.
#[post("/posts")]
async fn create_post(body: web::Json<CreatePost>) -> HttpResponse {
    HttpResponse::Created().finish()
}

#[put("/posts/{post_id}/comments/{comment_id}")]
async fn update_comment(path: web::Path<(u32, String)>) -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[delete("/posts/{id}")]
async fn delete_post(path: web::Path<u32>) -> HttpResponse {
    HttpResponse::NoContent().finish()
}

#[post("/login")]
async fn login() -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    HttpServer::new(|| {
        App::new()
            .service(
                web::scope("/api")
                    .wrap(Logger::default())
                    .service(list_posts)
                    .service(create_post)
                    .service(update_comment)
                    .service(delete_post),
            )
            .service(login)
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
