use log::error;

use gosling::LoadTest;

#[tokio::main]
async fn main() {
    // Nothing is sent until the configuration is known to be valid.
    let load_test = match LoadTest::initialize() {
        Ok(load_test) => load_test,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let format = load_test.configuration().report_format.clone();

    let report = match load_test.execute().await {
        Ok(report) => report,
        Err(e) => {
            error!("load test failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = report.print(&format) {
        error!("failed to print report: {}", e);
        std::process::exit(1);
    }
}
