use eventhub::config::Config;
use eventhub::error::Error;

#[actix_web::main]
async fn main() -> Result<(), Error> {
    eventhub::init_tracing();

    let config = Config::from_env()?;
    eventhub::run(config).await
}
