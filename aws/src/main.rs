use aws::AwsProvider;
use std::env;
use tfplug::PluginServer;

/// PEM files for serving TLS; both must be set to enable it
const CERT_FILE_ENV: &str = "TF_AWS_PLUGIN_CERT_FILE";
const KEY_FILE_ENV: &str = "TF_AWS_PLUGIN_KEY_FILE";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tfplug::init_logging();

    let mut server = PluginServer::new(AwsProvider::new());
    if let (Ok(cert_path), Ok(key_path)) = (env::var(CERT_FILE_ENV), env::var(KEY_FILE_ENV)) {
        server = server.with_tls(cert_path, key_path);
    }

    server.run().await?;

    Ok(())
}
