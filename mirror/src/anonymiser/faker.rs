//! Faker name dispatch for anonymisation directives.

use fake::faker::address::en::{CityName, CountryName, StateName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::creditcard::en::CreditCardNumber;
use fake::faker::currency::en::CurrencyCode;
use fake::faker::internet::en::{DomainSuffix, Password, SafeEmail, Username};
use fake::faker::lorem::en::{Paragraph, Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::{Rng, RngCore};

const EMAIL: &str = "EmailAddress";
const USERNAME: &str = "UserName";

/// Produces a fresh fake value for a faker name.
///
/// Unknown names yield the empty string. `EmailAddress` and `UserName` values
/// get a dot and two random bytes hex encoded appended so that repeated
/// generation over large tables rarely collides.
pub fn anonymise(faker_name: &str) -> String {
    let value = generate(faker_name);

    match faker_name {
        EMAIL | USERNAME if !value.is_empty() => {
            format!("{value}.{}", unique_suffix())
        }
        _ => value,
    }
}

fn generate(faker_name: &str) -> String {
    let mut rng = rand::rng();

    match faker_name {
        EMAIL => SafeEmail().fake_with_rng(&mut rng),
        USERNAME => Username().fake_with_rng(&mut rng),
        "FirstName" => FirstName().fake_with_rng(&mut rng),
        "LastName" => LastName().fake_with_rng(&mut rng),
        "FullName" => Name().fake_with_rng(&mut rng),
        "Password" => Password(8..16).fake_with_rng(&mut rng),
        "Phone" | "PhoneNumber" => PhoneNumber().fake_with_rng(&mut rng),
        "City" => CityName().fake_with_rng(&mut rng),
        "State" => StateName().fake_with_rng(&mut rng),
        "Street" => StreetName().fake_with_rng(&mut rng),
        "StreetAddress" => {
            let street: String = StreetName().fake_with_rng(&mut rng);
            format!("{} {street}", rng.random_range(1..2000))
        }
        "Zip" => ZipCode().fake_with_rng(&mut rng),
        "Country" => CountryName().fake_with_rng(&mut rng),
        "Company" => CompanyName().fake_with_rng(&mut rng),
        "JobTitle" => {
            let titles = [
                "Software Engineer",
                "Product Manager",
                "Data Analyst",
                "Designer",
                "Marketing Manager",
                "Sales Representative",
                "Customer Support",
                "Operations Manager",
            ];
            titles[rng.random_range(0..titles.len())].to_owned()
        }
        "DomainName" => {
            let word: String = Word().fake_with_rng(&mut rng);
            let suffix: String = DomainSuffix().fake_with_rng(&mut rng);
            format!("{word}{}.{suffix}", rng.random_range(1..1000))
        }
        "IPv4" => format!(
            "{}.{}.{}.{}",
            rng.random_range(1..255),
            rng.random_range(0..255),
            rng.random_range(0..255),
            rng.random_range(1..255)
        ),
        "UUID" => format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            rng.random::<u32>(),
            rng.random::<u16>(),
            (rng.random::<u16>() & 0x0FFF) | 0x4000,
            (rng.random::<u16>() & 0x3FFF) | 0x8000,
            rng.random::<u64>() & 0xFFFF_FFFF_FFFF_u64
        ),
        "Latitude" => format!("{:.6}", rng.random_range(-90.0..90.0)),
        "Longitude" => format!("{:.6}", rng.random_range(-180.0..180.0)),
        "CreditCardNum" => CreditCardNumber().fake_with_rng(&mut rng),
        "Currency" => CurrencyCode().fake_with_rng(&mut rng),
        "Word" => Word().fake_with_rng(&mut rng),
        "Sentence" => Sentence(5..10).fake_with_rng(&mut rng),
        "Paragraph" => Paragraph(3..5).fake_with_rng(&mut rng),
        _ => String::new(),
    }
}

fn unique_suffix() -> String {
    let mut bytes = [0u8; 2];
    rand::rng().fill_bytes(&mut bytes);
    format!("{:02x}{:02x}", bytes[0], bytes[1])
}
