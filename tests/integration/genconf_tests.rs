//! Apache configuration output tests.

use mrf_streamer::apache::{render, ApacheConfig};
use mrf_streamer::dataset::Registry;

use super::test_utils::{create_test_jpeg, Record, TestTree};

#[test]
fn test_one_block_per_directory() {
    let tree = TestTree::new();
    tree.add_gebco();
    tree.add_shaded();
    // Second descriptor for the Gebco data directory
    tree.write_descriptor(
        "Tif/Gebco/Gebco.webconf",
        "Size 2048 1024 1 2\nPageSize 512 512 1 2\nDataFile Gebco.pjg\nIndexFile Gebco.idx\n",
    );

    let (registry, report) = Registry::build(&tree.registry_config()).unwrap();
    let output = render(&registry, &ApacheConfig::default());

    assert_eq!(registry.len(), 2);
    assert_eq!(report.coalesced.len(), 1);
    assert_eq!(output.matches("<Directory ").count(), 2);
    assert_eq!(output.matches("</Directory>").count(), 2);
    assert!(output.contains("<Directory \"/var/www/html/tiles/Shaded\">"));
    assert_eq!(output.matches("MRF_ConfigurationFile").count(), 2);
}

#[test]
fn test_block_points_at_descriptor() {
    let tree = TestTree::new();
    let descriptor = tree.add_gebco();

    let (registry, _) = Registry::build(&tree.registry_config()).unwrap();
    let output = render(&registry, &ApacheConfig::new("/srv/www", "/mrf"));

    let expected = format!(
        "<Directory \"/srv/www/mrf/Tif\">\n    MRF_ConfigurationFile \"{}\"\n</Directory>\n",
        descriptor.display()
    );
    assert_eq!(output, expected);
}

#[test]
fn test_nested_routes() {
    let tree = TestTree::new();
    tree.write_pair(
        "Ocean/Bathy/Etopo",
        "Etopo",
        "pjg",
        &[Record::Tile(create_test_jpeg(3))],
    );
    tree.write_descriptor(
        "Ocean/Bathy/Etopo.webconf",
        "Size 512 512 1 0\nPageSize 512 512 1 0\nDataFile Etopo.pjg\nIndexFile Etopo.idx\n",
    );

    let (registry, _) = Registry::build(&tree.registry_config()).unwrap();
    let output = render(&registry, &ApacheConfig::default());

    assert!(output.contains("<Directory \"/var/www/html/tiles/Ocean/Bathy\">"));
}
