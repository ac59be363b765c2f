use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{server, Config, Result};

/// Runs the web server until Ctrl-C.
pub async fn serve(config: &Config) -> Result<Out<()>> {
    server::serve(config).await.pub_result(ErrorType::Internal)?;
    Ok("The server has shut down".into())
}
