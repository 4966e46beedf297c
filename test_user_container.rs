use prov_runtime::host::{HostObject, HostValue, NativeHost};
use prov_runtime::{Runtime, RuntimeConfig};

struct User {
    email: HostValue,
    age: HostValue,
    name: HostValue,
}

fn main() {
    let config = RuntimeConfig {
        source: Some("test_user_container".to_string()),
        report_stats_on_drop: false,
        ..Default::default()
    };
    let rt = Runtime::with_writer(config, Box::new(NativeHost), Box::new(std::io::stdout()));

    let user = User {
        email: HostValue::text("alice@example.com"),
        age: HostValue::text("42"),
        name: HostValue::text("Alice"),
    };
    // Only the email is tagged. Untagged fields written to the console stay out
    // of the log even while alice is the current owner.
    rt.tag_owned(user.email.id(), Some("alice@example.com"));

    println!("AGE: 42");
    rt.log_if_sensitive("stdout", &user.age, None);

    let new_age = HostValue::text("43");
    rt.propagate(new_age.id(), Some(user.age.id()), None);
    let age = HostValue::text("44");
    rt.propagate(age.id(), Some(new_age.id()), None);
    println!("NEW AGE: 44 (tagged: {})", rt.get(age.id()));
    rt.log_if_sensitive("stdout", &age, None);

    println!("name: Alice");
    rt.log_if_sensitive("stdout", &user.name, None);

    println!("{:#?}", rt.stats());
}
