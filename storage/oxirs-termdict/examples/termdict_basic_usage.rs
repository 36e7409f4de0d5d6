//! # Basic OxiRS TermDict Usage Example
//!
//! Demonstrates the core functionality of the oxirs-termdict crate:
//! encoding triples into identifiers, classifying identifiers, building
//! composite keys, and persisting the dictionary to disk.

use anyhow::Result;
use oxirs_termdict::{
    DictionaryConfig, FileStoreFactory, MemoryStoreFactory, Term, TermDictionary,
};

fn main() -> Result<()> {
    // Assemble the default chain and back it with memory
    let dictionary = TermDictionary::from_config(&DictionaryConfig::default())?;
    dictionary.initialise(&MemoryStoreFactory::new())?;
    println!("✅ Created term dictionary '{}'", dictionary.name());

    // Create some RDF terms
    let person = Term::iri("http://example.org/person/john");
    let name_predicate = Term::iri("http://xmlns.com/foaf/0.1/name");
    let type_predicate = Term::iri("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
    let john_name = Term::literal("John Doe");
    let biography = Term::lang_literal("A very long biography. ".repeat(100), "en");

    // Encode triples
    println!("\n🔑 Identifiers:");
    for object in [&john_name, &biography] {
        let ids = dictionary.as_identifiers(&person, &name_predicate, object)?;
        for id in &ids {
            println!("   {:>4} bytes  {}", id.len(), describe(&dictionary, id));
        }
    }
    let type_id = dictionary.get_id(&type_predicate, true)?;
    println!("   rdf:type -> {} ({} bytes)", type_id, type_id.len());

    // Decode them again
    let ids = dictionary.as_identifiers(&person, &name_predicate, &john_name)?;
    let triple = dictionary.as_triple(&ids)?;
    println!(
        "\n🔍 Decoded: {} {} {}",
        triple.subject, triple.predicate, triple.object
    );

    // Build an SPO index key
    let key = dictionary.compose3(&ids[0], &ids[1], &ids[2])?;
    println!("\n🧩 Composite key of {} bytes", key.len());
    println!("   splits into {} parts", dictionary.decompose(&key)?.len());

    // Per-layer statistics
    println!("\n📊 Layer statistics:");
    for stats in dictionary.stats() {
        println!("   - {}: {:?}", stats.layer, stats.counters);
    }
    dictionary.close()?;

    // Persist to disk and read back
    let location = std::env::temp_dir().join("oxirs_termdict_example");
    let id = {
        let persistent = TermDictionary::from_config(&DictionaryConfig::default())?;
        persistent.initialise(&FileStoreFactory::new(&location)?)?;
        let id = persistent.get_id(&biography, false)?;
        persistent.close()?;
        id
    };

    let reopened = TermDictionary::from_config(&DictionaryConfig::default())?;
    reopened.initialise(&FileStoreFactory::new(&location)?)?;
    let restored = reopened.get_value(&id, false)?;
    println!(
        "\n💾 Reopened dictionary in {} restored the biography: {}",
        location.display(),
        restored.as_ref() == Some(&biography)
    );
    reopened.close()?;

    println!("\n✅ Example completed successfully!");
    Ok(())
}

fn describe(dictionary: &TermDictionary, id: &[u8]) -> &'static str {
    if dictionary.is_resource(id) {
        "resource"
    } else if dictionary.is_bnode(id) {
        "blank node"
    } else if dictionary.is_literal(id) {
        "literal"
    } else {
        "unknown"
    }
}
