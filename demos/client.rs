// Import the client object and the metric operations.
use statsd_tags::prelude::*;
use statsd_tags::Client;

fn main() -> statsd_tags::Result<()> {
    let client = Client::new("127.0.0.1:8125", "myapp")?;
    client.incr("some.metric");
    client
        .timing_with_tags("some.request", 12.5)
        .with_tag("route", "/home")
        .with_tag_value("canary")
        .send();

    {
        let pipe = client.pipeline();
        pipe.gauge("queue.depth", 4);
        pipe.set("users.seen", "alice");
    }
    println!("Sent some metrics!");
    Ok(())
}
